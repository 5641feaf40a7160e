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

//! A doubly-linked, intrusive queue of threads. The same type backs the
//! ready queues, a mutex's waiter list and a mailbox's sender/receiver
//! lists -- only the insertion policy differs (FIFO append, or
//! priority-ordered). Links live inline in each [`Tcb`] (`prev`/`next`),
//! since a thread is a member of at most one such queue at a time.

use super::thread::{Pool, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Append to the tail: plain FIFO (ready queues, mailbox queues).
    Fifo,
    /// Insert after every waiter of strictly higher-or-equal priority, so
    /// the queue stays ordered by (priority, FIFO-within-priority).
    ByPriority,
}

#[derive(Debug, Default)]
pub struct WaitQueue {
    head: Option<ThreadId>,
    tail: Option<ThreadId>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn front(&self) -> Option<ThreadId> {
        self.head
    }

    pub fn len(&self, pool: &Pool) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while let Some(id) = cur {
            n += 1;
            cur = pool.get(id).next;
        }
        n
    }

    /// Inserts `id` per `mode`. `id` must not currently be linked into any
    /// queue (its `prev`/`next` are overwritten unconditionally).
    pub fn insert(&mut self, pool: &mut Pool, id: ThreadId, mode: InsertMode) {
        match mode {
            InsertMode::Fifo => self.push_back(pool, id),
            InsertMode::ByPriority => self.insert_by_priority(pool, id),
        }
    }

    fn push_back(&mut self, pool: &mut Pool, id: ThreadId) {
        pool.get_mut(id).prev = self.tail;
        pool.get_mut(id).next = None;
        match self.tail {
            Some(tail) => pool.get_mut(tail).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn insert_by_priority(&mut self, pool: &mut Pool, id: ThreadId) {
        let priority = pool.get(id).priority;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            if pool.get(c).priority > priority {
                break;
            }
            cursor = pool.get(c).next;
        }
        match cursor {
            // Insert before `cursor` (first strictly-lower-priority waiter),
            // which keeps FIFO order among equal priorities since we only
            // stop at a *strictly* lower one.
            Some(before) => {
                let prev = pool.get(before).prev;
                pool.get_mut(id).prev = prev;
                pool.get_mut(id).next = Some(before);
                pool.get_mut(before).prev = Some(id);
                match prev {
                    Some(p) => pool.get_mut(p).next = Some(id),
                    None => self.head = Some(id),
                }
            }
            None => self.push_back(pool, id),
        }
    }

    pub fn pop_front(&mut self, pool: &mut Pool) -> Option<ThreadId> {
        let id = self.head?;
        self.remove(pool, id);
        Some(id)
    }

    /// Removes `id` from wherever it sits in the queue. No-op if `id` is
    /// not actually linked here -- callers (notably timeout expiry) may
    /// race a primitive that already dequeued it.
    pub fn remove(&mut self, pool: &mut Pool, id: ThreadId) {
        let (prev, next) = {
            let t = pool.get(id);
            (t.prev, t.next)
        };
        match prev {
            Some(p) => pool.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => pool.get_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let t = pool.get_mut(id);
        t.prev = None;
        t.next = None;
    }

    #[cfg(test)]
    pub(crate) fn iter<'a>(&'a self, pool: &'a Pool) -> impl Iterator<Item = ThreadId> + 'a {
        let mut cur = self.head;
        core::iter::from_fn(move || {
            let id = cur?;
            cur = pool.get(id).next;
            Some(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy(_: usize) {}

    fn spawn(pool: &mut Pool, priority: u8) -> ThreadId {
        pool.allocate(dummy, 0, None, 0, 0, priority, 0).unwrap()
    }

    #[test]
    fn fifo_preserves_arrival_order() {
        let mut pool = Pool::new();
        let mut q = WaitQueue::new();
        let (a, b, c) = (spawn(&mut pool, 5), spawn(&mut pool, 5), spawn(&mut pool, 5));
        q.insert(&mut pool, a, InsertMode::Fifo);
        q.insert(&mut pool, b, InsertMode::Fifo);
        q.insert(&mut pool, c, InsertMode::Fifo);
        assert_eq!(q.pop_front(&mut pool), Some(a));
        assert_eq!(q.pop_front(&mut pool), Some(b));
        assert_eq!(q.pop_front(&mut pool), Some(c));
        assert!(q.is_empty());
    }

    #[test]
    fn by_priority_orders_across_priorities_and_fifo_within() {
        // Mirrors spec scenario S3: arrival order low(5), hi(1), mid(3).
        let mut pool = Pool::new();
        let mut q = WaitQueue::new();
        let low = spawn(&mut pool, 5);
        let hi = spawn(&mut pool, 1);
        let mid = spawn(&mut pool, 3);
        q.insert(&mut pool, low, InsertMode::ByPriority);
        q.insert(&mut pool, hi, InsertMode::ByPriority);
        q.insert(&mut pool, mid, InsertMode::ByPriority);
        assert_eq!(q.pop_front(&mut pool), Some(hi));
        assert_eq!(q.pop_front(&mut pool), Some(mid));
        assert_eq!(q.pop_front(&mut pool), Some(low));
    }

    #[test]
    fn by_priority_fifo_within_same_priority() {
        // Mirrors spec scenario S2: T1, T2, T3 all equal priority.
        let mut pool = Pool::new();
        let mut q = WaitQueue::new();
        let (t1, t2, t3) = (spawn(&mut pool, 4), spawn(&mut pool, 4), spawn(&mut pool, 4));
        q.insert(&mut pool, t1, InsertMode::ByPriority);
        q.insert(&mut pool, t2, InsertMode::ByPriority);
        q.insert(&mut pool, t3, InsertMode::ByPriority);
        assert_eq!(q.pop_front(&mut pool), Some(t1));
        assert_eq!(q.pop_front(&mut pool), Some(t2));
        assert_eq!(q.pop_front(&mut pool), Some(t3));
    }

    #[test]
    fn remove_from_middle_relinks_neighbors() {
        let mut pool = Pool::new();
        let mut q = WaitQueue::new();
        let (a, b, c) = (spawn(&mut pool, 1), spawn(&mut pool, 1), spawn(&mut pool, 1));
        q.insert(&mut pool, a, InsertMode::Fifo);
        q.insert(&mut pool, b, InsertMode::Fifo);
        q.insert(&mut pool, c, InsertMode::Fifo);
        q.remove(&mut pool, b);
        let remaining: std::vec::Vec<_> = q.iter(&pool).collect();
        assert_eq!(remaining, std::vec![a, c]);
    }
}
