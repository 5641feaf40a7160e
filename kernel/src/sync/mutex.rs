// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A binary mutex with a priority-ordered waiter queue and no priority
//! inheritance: the owner keeps running at whatever priority it already
//! had, even while higher-priority threads queue behind it. `unlock`
//! hands ownership straight to the next waiter inside the same critical
//! section it woke them in, so there is no window where a third thread
//! could steal the lock between the wakeup and the old owner's release.

use core::cell::UnsafeCell;

use crate::error::{Error, Result};
use crate::scheduler::{self, InsertMode, RunState, ThreadId, WaitOutcome, WaitQueue};

struct Inner {
    owner: Option<ThreadId>,
    waiters: WaitQueue,
}

pub struct Mutex {
    inner: UnsafeCell<Inner>,
}

unsafe impl Sync for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(Inner {
                owner: None,
                waiters: WaitQueue::new(),
            }),
        }
    }

    /// Blocks until the mutex is free, then takes it.
    pub fn lock(&self) -> Result<()> {
        let state = scheduler::enter_critical();
        // SAFETY: the critical section above is held for this whole call.
        let inner = unsafe { &mut *self.inner.get() };
        let me = unsafe { scheduler::current_unchecked() };
        if inner.owner.is_none() {
            inner.owner = Some(me);
        } else {
            // Resuming here means `unlock` already made us the owner.
            unsafe { scheduler::block_on(&mut inner.waiters, InsertMode::ByPriority, RunState::BlockMutex, None) };
        }
        unsafe { scheduler::exit_critical(state) };
        Ok(())
    }

    /// Takes the mutex only if it is free right now.
    pub fn try_lock(&self) -> Result<()> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let me = unsafe { scheduler::current_unchecked() };
        let result = if inner.owner.is_none() {
            inner.owner = Some(me);
            Ok(())
        } else {
            Err(Error::WouldBlock)
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }

    /// Blocks up to `ticks` timer ticks for the mutex to free up.
    pub fn lock_timeout(&self, ticks: u32) -> Result<()> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let me = unsafe { scheduler::current_unchecked() };
        let result = if inner.owner.is_none() {
            inner.owner = Some(me);
            Ok(())
        } else if ticks == 0 {
            Err(Error::Timeout)
        } else {
            let outcome = unsafe {
                scheduler::block_on(
                    &mut inner.waiters,
                    InsertMode::ByPriority,
                    RunState::BlockMutex,
                    Some(ticks),
                )
            };
            match outcome {
                WaitOutcome::Satisfied => Ok(()),
                WaitOutcome::TimedOut => Err(Error::Timeout),
            }
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }

    /// Releases the mutex. Fails if the caller does not currently hold it.
    /// If a thread was waiting, ownership transfers to it directly; the
    /// caller never observes the mutex as briefly free.
    pub fn unlock(&self) -> Result<()> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let me = unsafe { scheduler::current_unchecked() };
        let result = if inner.owner != Some(me) {
            Err(Error::NotOwner)
        } else {
            inner.owner = unsafe { scheduler::wake_one(&mut inner.waiters) };
            Ok(())
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }

    pub fn is_locked(&self) -> bool {
        let state = scheduler::enter_critical();
        let locked = unsafe { (*self.inner.get()).owner.is_some() };
        unsafe { scheduler::exit_critical(state) };
        locked
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

// Lock contention (scenarios with more than one live thread) needs a real
// scheduler driving real context switches, which `kestrel_arch::host_stub`
// cannot provide -- see its module docs. Host `cargo test` is limited to
// the uncontended, single-thread paths below; contended-path coverage
// still needs an on-target suite and does not exist yet.
#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn idle_entry(_: usize) {}

    fn ensure_scheduler_up() {
        static mut IDLE_STACK: [u8; 256] = [0; 256];
        // SAFETY: test-only, and `init` is a no-op once already called.
        let stack = unsafe { &mut *core::ptr::addr_of_mut!(IDLE_STACK) };
        scheduler::init(idle_entry, stack);
    }

    #[test]
    fn try_lock_then_unlock_round_trips() {
        ensure_scheduler_up();
        let m = Mutex::new();
        assert!(!m.is_locked());
        assert_eq!(m.try_lock(), Ok(()));
        assert!(m.is_locked());
        assert_eq!(m.unlock(), Ok(()));
        assert!(!m.is_locked());
    }

    #[test]
    fn try_lock_while_held_returns_would_block() {
        ensure_scheduler_up();
        let m = Mutex::new();
        m.try_lock().unwrap();
        assert_eq!(m.try_lock(), Err(Error::WouldBlock));
        m.unlock().unwrap();
    }

    #[test]
    fn unlock_without_holding_is_rejected() {
        ensure_scheduler_up();
        let m = Mutex::new();
        assert_eq!(m.unlock(), Err(Error::NotOwner));
    }

    #[test]
    fn lock_timeout_with_zero_ticks_fails_immediately_when_held() {
        ensure_scheduler_up();
        let m = Mutex::new();
        m.try_lock().unwrap();
        assert_eq!(m.lock_timeout(0), Err(Error::Timeout));
        m.unlock().unwrap();
    }

    #[test]
    fn lock_timeout_takes_the_mutex_immediately_when_free() {
        ensure_scheduler_up();
        let m = Mutex::new();
        assert_eq!(m.lock_timeout(0), Ok(()));
        m.unlock().unwrap();
    }
}
