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

//! Thread control block and the statically-sized pool that owns them.

use kestrel_arch::ThreadEntry;

use crate::config::MAX_THREADS;

/// A small integer index into the TCB pool. `u8` comfortably covers the
/// `MAX_THREADS <= 128` range enforced in [`crate::config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub(crate) u8);

impl ThreadId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Run state, matching the kernel's state machine one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Ready,
    BlockMutex,
    BlockMboxSend,
    BlockMboxRecv,
    BlockSleep,
    BlockRendezvousSend,
    BlockRendezvousRecv,
    Terminated,
}

/// Why a blocked thread re-emerged: the primitive was satisfied, or the
/// timeout elapsed first. Read by the blocking call that put it to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

/// A mailbox payload: a tag plus a `usize`-sized value, wide enough for a
/// pointer or an integer and `Copy` so handoff never needs to move or
/// allocate anything. The tag's meaning is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
    pub tag: u32,
    pub value: usize,
}

impl Msg {
    pub const fn new(tag: u32, value: usize) -> Self {
        Self { tag, value }
    }
}

/// Thread control block. Lives in a fixed pool slot for the thread's
/// entire lifetime; membership in the ready set, a wait queue, or neither,
/// is expressed purely through `prev`/`next`, since a TCB is a member of
/// at most one such queue at a time (the timeout list is a separate
/// structure and does not use these links).
pub struct Tcb {
    pub entry: ThreadEntry,
    pub arg: usize,
    pub name: Option<&'static str>,
    pub stack_base: usize,
    pub stack_size: usize,
    /// Current priority. No priority inheritance: this is always the
    /// priority the thread was created or last explicitly set with.
    pub priority: u8,
    /// Saved stack pointer; valid whenever this thread is not RUNNING.
    pub sp: usize,
    pub state: RunState,
    pub prev: Option<ThreadId>,
    pub next: Option<ThreadId>,
    /// Parked message for a sender blocked on a full buffer or a
    /// rendezvous; `Some` only while `state` is `BlockMboxSend` or
    /// `BlockRendezvousSend`.
    pub parked_msg: Option<Msg>,
    pub wait_outcome: WaitOutcome,
    /// Ticks remaining in the round-robin quantum; only meaningful with
    /// the `round_robin` feature.
    pub time_slice: u32,
}

impl Tcb {
    #[allow(clippy::too_many_arguments)]
    fn new(
        entry: ThreadEntry,
        arg: usize,
        name: Option<&'static str>,
        stack_base: usize,
        stack_size: usize,
        priority: u8,
        sp: usize,
    ) -> Self {
        Self {
            entry,
            arg,
            name,
            stack_base,
            stack_size,
            priority,
            sp,
            state: RunState::Ready,
            prev: None,
            next: None,
            parked_msg: None,
            wait_outcome: WaitOutcome::Satisfied,
            time_slice: crate::config::TIME_SLICE_TICKS,
        }
    }
}

/// Fixed-capacity arena of thread control blocks, indexed by [`ThreadId`].
/// A `None` slot is free. There is no compaction: a terminated thread's
/// slot is reclaimed immediately (state set to `Terminated`, detached from
/// every queue) and can be reused by a later `thread_create`.
pub struct Pool {
    slots: [Option<Tcb>; MAX_THREADS],
}

impl Pool {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_THREADS],
        }
    }

    pub fn get(&self, id: ThreadId) -> &Tcb {
        self.slots[id.index()]
            .as_ref()
            .expect("ThreadId referenced an empty pool slot")
    }

    pub fn get_mut(&mut self, id: ThreadId) -> &mut Tcb {
        self.slots[id.index()]
            .as_mut()
            .expect("ThreadId referenced an empty pool slot")
    }

    pub fn is_live(&self, id: ThreadId) -> bool {
        id.index() < MAX_THREADS && self.slots[id.index()].is_some()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn allocate(
        &mut self,
        entry: ThreadEntry,
        arg: usize,
        name: Option<&'static str>,
        stack_base: usize,
        stack_size: usize,
        priority: u8,
        sp: usize,
    ) -> Option<ThreadId> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(Tcb::new(entry, arg, name, stack_base, stack_size, priority, sp));
        Some(ThreadId(index as u8))
    }

    pub fn free(&mut self, id: ThreadId) {
        self.slots[id.index()] = None;
    }

    pub fn count_live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn count_terminated(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Some(t) if t.state == RunState::Terminated))
            .count()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy_entry(_arg: usize) {}

    #[test]
    fn allocate_reuses_freed_slots() {
        let mut pool = Pool::new();
        let a = pool.allocate(dummy_entry, 0, None, 0, 0, 1, 0).unwrap();
        pool.free(a);
        let b = pool.allocate(dummy_entry, 0, None, 0, 0, 1, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn allocate_fails_when_pool_is_full() {
        let mut pool = Pool::new();
        for _ in 0..MAX_THREADS {
            pool.allocate(dummy_entry, 0, None, 0, 0, 1, 0).unwrap();
        }
        assert!(pool.allocate(dummy_entry, 0, None, 0, 0, 1, 0).is_none());
    }
}
