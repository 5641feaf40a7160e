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

//! Delta-encoded, sorted list of pending timeouts.
//!
//! Deliberately a structure of its own, not the `prev`/`next` links on
//! [`Tcb`]: a thread blocked with a timeout sits in *two* lists at once --
//! the primitive's wait queue, and this one -- and a single pair of links
//! cannot represent membership in both simultaneously.
//!
//! Entries are chained in ascending order of expiry, each storing the
//! tick count *since the previous entry* rather than an absolute
//! deadline, so advancing the clock by one tick costs a single
//! decrement of the head's delta regardless of how many timeouts are
//! outstanding; only entries whose delta actually reaches zero are ever
//! touched.

use core::ptr::NonNull;

use super::thread::ThreadId;
use super::wait_queue::WaitQueue;
use crate::config::MAX_THREADS;

struct Entry {
    delta: u32,
    /// The wait queue to unlink this thread from on expiry, if any.
    /// `None` for a plain `thread_sleep` with nothing to dequeue from.
    queue: Option<NonNull<WaitQueue>>,
    next: Option<ThreadId>,
}

/// At most one outstanding timeout per thread, so a TCB-indexed array
/// gives each entry a stable slot without any separate allocation.
pub struct TimeoutList {
    entries: [Option<Entry>; MAX_THREADS],
    head: Option<ThreadId>,
}

impl TimeoutList {
    pub const fn new() -> Self {
        Self {
            entries: [const { None }; MAX_THREADS],
            head: None,
        }
    }

    /// Registers `id` to expire in `ticks` ticks, unlinking it from
    /// `queue` (if given) when it does. `id` must not already have a
    /// pending timeout.
    ///
    /// # Safety
    /// `queue`, if given, must stay valid (i.e. the owning [`Mutex`] or
    /// [`Mailbox`] must outlive the timeout) until either the timeout
    /// fires or is cancelled via [`Self::cancel`].
    pub unsafe fn schedule(&mut self, id: ThreadId, ticks: u32, queue: Option<NonNull<WaitQueue>>) {
        debug_assert!(ticks > 0);
        debug_assert!(self.entries[id.index()].is_none());

        let mut cursor = self.head;
        let mut prev: Option<ThreadId> = None;
        let mut elapsed = 0u32;
        while let Some(c) = cursor {
            let entry_delta = self.entries[c.index()].as_ref().unwrap().delta;
            if elapsed + entry_delta > ticks {
                break;
            }
            elapsed += entry_delta;
            prev = Some(c);
            cursor = self.entries[c.index()].as_ref().unwrap().next;
        }

        let delta = ticks - elapsed;
        if let Some(c) = cursor {
            self.entries[c.index()].as_mut().unwrap().delta -= delta;
        }
        self.entries[id.index()] = Some(Entry {
            delta,
            queue,
            next: cursor,
        });
        match prev {
            Some(p) => self.entries[p.index()].as_mut().unwrap().next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Cancels `id`'s pending timeout, if any (the primitive it was
    /// waiting on was satisfied before the deadline). Preserves the
    /// total delay of everything after it in the chain.
    pub fn cancel(&mut self, id: ThreadId) {
        let Some(entry) = self.entries[id.index()].take() else {
            return;
        };
        if let Some(next) = entry.next {
            self.entries[next.index()].as_mut().unwrap().delta += entry.delta;
        }
        let mut cursor = &mut self.head;
        loop {
            match *cursor {
                Some(c) if c == id => {
                    *cursor = entry.next;
                    break;
                }
                Some(c) => {
                    // SAFETY: walking a chain of entries we know to be live.
                    let next_slot = &mut self.entries[c.index()].as_mut().unwrap().next;
                    cursor = next_slot;
                }
                None => break,
            }
        }
    }

    /// Advances the clock by one tick and pops every entry that has now
    /// expired, in expiry order. The returned queue pointer (if any)
    /// still needs unlinking by the caller, which alone knows how to
    /// reach the owning `Pool`.
    pub fn tick(&mut self) -> ExpiredIter<'_> {
        if let Some(head) = self.head {
            let entry = self.entries[head.index()].as_mut().unwrap();
            entry.delta = entry.delta.saturating_sub(1);
        }
        ExpiredIter { list: self }
    }
}

impl Default for TimeoutList {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ExpiredIter<'a> {
    list: &'a mut TimeoutList,
}

impl Iterator for ExpiredIter<'_> {
    type Item = (ThreadId, Option<NonNull<WaitQueue>>);

    fn next(&mut self) -> Option<Self::Item> {
        let head = self.list.head?;
        if self.list.entries[head.index()].as_ref().unwrap().delta != 0 {
            return None;
        }
        let entry = self.list.entries[head.index()].take().unwrap();
        self.list.head = entry.next;
        Some((head, entry.queue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ThreadId {
        ThreadId(n)
    }

    #[test]
    fn single_timeout_fires_after_exact_tick_count() {
        let mut list = TimeoutList::new();
        unsafe { list.schedule(id(0), 3, None) };
        assert_eq!(list.tick().count(), 0);
        assert_eq!(list.tick().count(), 0);
        let expired: std::vec::Vec<_> = list.tick().collect();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, id(0));
    }

    #[test]
    fn simultaneous_expiries_cascade_in_one_tick() {
        let mut list = TimeoutList::new();
        unsafe {
            list.schedule(id(0), 2, None);
            list.schedule(id(1), 2, None);
            list.schedule(id(2), 5, None);
        }
        list.tick();
        let expired: std::vec::Vec<_> = list.tick().map(|(i, _)| i).collect();
        assert_eq!(expired.len(), 2);
        assert!(expired.contains(&id(0)));
        assert!(expired.contains(&id(1)));
    }

    #[test]
    fn cancel_preserves_later_delays() {
        let mut list = TimeoutList::new();
        unsafe {
            list.schedule(id(0), 2, None);
            list.schedule(id(1), 5, None);
        }
        list.cancel(id(0));
        for _ in 0..4 {
            assert_eq!(list.tick().count(), 0);
        }
        let expired: std::vec::Vec<_> = list.tick().collect();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, id(1));
    }

    #[test]
    fn cancel_of_unscheduled_thread_is_a_no_op() {
        let mut list = TimeoutList::new();
        list.cancel(id(7));
        assert!(list.head.is_none());
    }
}
