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

//! A fixed-capacity mailbox of [`Msg`] payloads. At `N == 0` it degenerates
//! into a synchronous rendezvous: every `send` blocks until a matching
//! `recv` is ready to take the message directly, and vice versa.
//!
//! The invariant that keeps both sides simple: the receiver queue is only
//! ever non-empty while the buffer is empty, and the sender queue only
//! ever non-empty while the buffer is full (trivially "full" at `N == 0`).
//! So a `send`/`recv` that cannot complete immediately always has an exact
//! counterpart already queued up to satisfy it on the other side -- no
//! primitive ever wakes a waiter and hopes it still wants what it asked
//! for; the message is handed off, or slotted into the ring, before the
//! waiter is made ready at all.

use core::cell::UnsafeCell;

use crate::error::{Error, Result};
use crate::scheduler::{self, InsertMode, Msg, RunState, WaitOutcome, WaitQueue};

/// `N == 0` is a synchronous rendezvous, not a buffered handoff, so a
/// blocked sender/receiver gets its own run states even though the queue
/// and handoff mechanics underneath are shared with the buffered case.
const fn send_block_state(capacity: usize) -> RunState {
    if capacity == 0 {
        RunState::BlockRendezvousSend
    } else {
        RunState::BlockMboxSend
    }
}

const fn recv_block_state(capacity: usize) -> RunState {
    if capacity == 0 {
        RunState::BlockRendezvousRecv
    } else {
        RunState::BlockMboxRecv
    }
}

struct Inner<const N: usize> {
    ring: [Msg; N],
    head: usize,
    len: usize,
    senders: WaitQueue,
    receivers: WaitQueue,
}

impl<const N: usize> Inner<N> {
    const fn new() -> Self {
        Self {
            ring: [Msg::new(0, 0); N],
            head: 0,
            len: 0,
            senders: WaitQueue::new(),
            receivers: WaitQueue::new(),
        }
    }

    fn push(&mut self, msg: Msg) {
        let tail = (self.head + self.len) % N.max(1);
        self.ring[tail] = msg;
        self.len += 1;
    }

    fn pop(&mut self) -> Msg {
        let msg = self.ring[self.head];
        self.head = (self.head + 1) % N.max(1);
        self.len -= 1;
        msg
    }
}

pub struct Mailbox<const N: usize> {
    inner: UnsafeCell<Inner<N>>,
}

unsafe impl<const N: usize> Sync for Mailbox<N> {}

impl<const N: usize> Mailbox<N> {
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(Inner::new()),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        let state = scheduler::enter_critical();
        let len = unsafe { (*self.inner.get()).len };
        unsafe { scheduler::exit_critical(state) };
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until `msg` is either buffered or handed directly to a
    /// waiting receiver.
    pub fn send(&self, msg: Msg) {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let pool = unsafe { scheduler::pool_mut() };
        if let Some(receiver) = inner.receivers.pop_front(pool) {
            pool.get_mut(receiver).parked_msg = Some(msg);
            unsafe { scheduler::ready_again(receiver) };
        } else if inner.len < N {
            inner.push(msg);
        } else {
            let me = unsafe { scheduler::current_unchecked() };
            pool.get_mut(me).parked_msg = Some(msg);
            unsafe {
                scheduler::block_on(&mut inner.senders, InsertMode::Fifo, send_block_state(N), None);
            }
        }
        unsafe { scheduler::exit_critical(state) };
    }

    /// Sends only if the buffer has room or a receiver is already waiting;
    /// never blocks.
    pub fn try_send(&self, msg: Msg) -> Result<()> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let pool = unsafe { scheduler::pool_mut() };
        let result = if let Some(receiver) = inner.receivers.pop_front(pool) {
            pool.get_mut(receiver).parked_msg = Some(msg);
            unsafe { scheduler::ready_again(receiver) };
            Ok(())
        } else if inner.len < N {
            inner.push(msg);
            Ok(())
        } else {
            Err(Error::WouldBlock)
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }

    /// Blocks up to `ticks` timer ticks for room, or a waiting receiver.
    pub fn send_timeout(&self, msg: Msg, ticks: u32) -> Result<()> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let pool = unsafe { scheduler::pool_mut() };
        let result = if let Some(receiver) = inner.receivers.pop_front(pool) {
            pool.get_mut(receiver).parked_msg = Some(msg);
            unsafe { scheduler::ready_again(receiver) };
            Ok(())
        } else if inner.len < N {
            inner.push(msg);
            Ok(())
        } else if ticks == 0 {
            Err(Error::Timeout)
        } else {
            let me = unsafe { scheduler::current_unchecked() };
            pool.get_mut(me).parked_msg = Some(msg);
            let outcome = unsafe {
                scheduler::block_on(&mut inner.senders, InsertMode::Fifo, send_block_state(N), Some(ticks))
            };
            match outcome {
                WaitOutcome::Satisfied => Ok(()),
                WaitOutcome::TimedOut => {
                    pool.get_mut(me).parked_msg = None;
                    Err(Error::Timeout)
                }
            }
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }

    /// Blocks until a message is available, either from the buffer or
    /// handed directly from a waiting sender.
    pub fn recv(&self) -> Msg {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let pool = unsafe { scheduler::pool_mut() };
        let msg = if inner.len > 0 {
            let msg = inner.pop();
            if let Some(sender) = inner.senders.pop_front(pool) {
                let parked = pool.get_mut(sender).parked_msg.take().expect("a parked sender always carries its message");
                inner.push(parked);
                unsafe { scheduler::ready_again(sender) };
            }
            msg
        } else if let Some(sender) = inner.senders.pop_front(pool) {
            let parked = pool.get_mut(sender).parked_msg.take().expect("a parked sender always carries its message");
            unsafe { scheduler::ready_again(sender) };
            parked
        } else {
            let me = unsafe { scheduler::current_unchecked() };
            unsafe {
                scheduler::block_on(&mut inner.receivers, InsertMode::Fifo, recv_block_state(N), None);
            }
            pool.get_mut(me).parked_msg.take().expect("a woken receiver was handed a message")
        };
        unsafe { scheduler::exit_critical(state) };
        msg
    }

    /// Receives only if a message is already available; never blocks.
    pub fn try_recv(&self) -> Result<Msg> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let pool = unsafe { scheduler::pool_mut() };
        let result = if inner.len > 0 {
            let msg = inner.pop();
            if let Some(sender) = inner.senders.pop_front(pool) {
                let parked = pool.get_mut(sender).parked_msg.take().expect("a parked sender always carries its message");
                inner.push(parked);
                unsafe { scheduler::ready_again(sender) };
            }
            Ok(msg)
        } else if let Some(sender) = inner.senders.pop_front(pool) {
            let parked = pool.get_mut(sender).parked_msg.take().expect("a parked sender always carries its message");
            unsafe { scheduler::ready_again(sender) };
            Ok(parked)
        } else {
            Err(Error::WouldBlock)
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }

    /// Blocks up to `ticks` timer ticks for a message to become available.
    pub fn recv_timeout(&self, ticks: u32) -> Result<Msg> {
        let state = scheduler::enter_critical();
        let inner = unsafe { &mut *self.inner.get() };
        let pool = unsafe { scheduler::pool_mut() };
        let result = if inner.len > 0 {
            let msg = inner.pop();
            if let Some(sender) = inner.senders.pop_front(pool) {
                let parked = pool.get_mut(sender).parked_msg.take().expect("a parked sender always carries its message");
                inner.push(parked);
                unsafe { scheduler::ready_again(sender) };
            }
            Ok(msg)
        } else if let Some(sender) = inner.senders.pop_front(pool) {
            let parked = pool.get_mut(sender).parked_msg.take().expect("a parked sender always carries its message");
            unsafe { scheduler::ready_again(sender) };
            Ok(parked)
        } else if ticks == 0 {
            Err(Error::Timeout)
        } else {
            let me = unsafe { scheduler::current_unchecked() };
            let outcome = unsafe {
                scheduler::block_on(&mut inner.receivers, InsertMode::Fifo, recv_block_state(N), Some(ticks))
            };
            match outcome {
                WaitOutcome::Satisfied => {
                    Ok(pool.get_mut(me).parked_msg.take().expect("a woken receiver was handed a message"))
                }
                WaitOutcome::TimedOut => Err(Error::Timeout),
            }
        };
        unsafe { scheduler::exit_critical(state) };
        result
    }
}

impl<const N: usize> Default for Mailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

// As in `sync::mutex`, contention scenarios need real threads and a real
// context switch, which `kestrel_arch::host_stub` cannot provide. The host
// suite here is limited to single-thread buffer bookkeeping; on-target
// coverage for contended send/recv does not exist yet.
#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn idle_entry(_: usize) {}

    fn ensure_scheduler_up() {
        static mut IDLE_STACK: [u8; 256] = [0; 256];
        let stack = unsafe { &mut *core::ptr::addr_of_mut!(IDLE_STACK) };
        scheduler::init(idle_entry, stack);
    }

    #[test]
    fn try_send_and_try_recv_preserve_fifo_order() {
        ensure_scheduler_up();
        let mbox: Mailbox<4> = Mailbox::new();
        mbox.try_send(Msg::new(0, 1)).unwrap();
        mbox.try_send(Msg::new(0, 2)).unwrap();
        mbox.try_send(Msg::new(0, 3)).unwrap();
        assert_eq!(mbox.try_recv(), Ok(Msg::new(0, 1)));
        assert_eq!(mbox.try_recv(), Ok(Msg::new(0, 2)));
        assert_eq!(mbox.try_recv(), Ok(Msg::new(0, 3)));
        assert_eq!(mbox.try_recv(), Err(Error::WouldBlock));
    }

    #[test]
    fn try_send_rejects_when_buffer_is_full() {
        ensure_scheduler_up();
        let mbox: Mailbox<2> = Mailbox::new();
        mbox.try_send(Msg::new(0, 10)).unwrap();
        mbox.try_send(Msg::new(0, 20)).unwrap();
        assert_eq!(mbox.try_send(Msg::new(0, 30)), Err(Error::WouldBlock));
        assert_eq!(mbox.len(), 2);
    }

    #[test]
    fn try_recv_on_empty_buffer_would_block() {
        ensure_scheduler_up();
        let mbox: Mailbox<4> = Mailbox::new();
        assert_eq!(mbox.try_recv(), Err(Error::WouldBlock));
    }

    #[test]
    fn zero_capacity_mailbox_never_buffers() {
        ensure_scheduler_up();
        let mbox: Mailbox<0> = Mailbox::new();
        assert_eq!(mbox.capacity(), 0);
        assert_eq!(mbox.try_send(Msg::new(0, 1)), Err(Error::WouldBlock));
    }

    #[test]
    fn send_timeout_with_zero_ticks_fails_immediately_on_full_buffer() {
        ensure_scheduler_up();
        let mbox: Mailbox<1> = Mailbox::new();
        mbox.try_send(Msg::new(0, 1)).unwrap();
        assert_eq!(mbox.send_timeout(Msg::new(0, 2), 0), Err(Error::Timeout));
        assert_eq!(mbox.len(), 1);
    }

    #[test]
    fn recv_timeout_with_zero_ticks_fails_immediately_on_empty_buffer() {
        ensure_scheduler_up();
        let mbox: Mailbox<1> = Mailbox::new();
        assert_eq!(mbox.recv_timeout(0), Err(Error::Timeout));
    }
}
