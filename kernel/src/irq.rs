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

//! Interrupt masking primitive and the IRQ dispatch table.
//!
//! [`IrqLock`] is the kernel's sole concurrency-control primitive: on a
//! single CPU, "interrupts disabled" is a critical section. Every mutation
//! of the ready set, wait queues, the timeout list or an IRQ table slot
//! happens while holding one.

use core::{
    cell::{Cell, UnsafeCell},
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicU32, Ordering},
};

use kestrel_arch::Arch;

use crate::{config::MAX_IRQS, error::Error, scheduler};

#[repr(transparent)]
#[derive(Debug)]
struct IrqLockRaw(Cell<usize>);

impl IrqLockRaw {
    const fn new() -> Self {
        Self(Cell::new(0))
    }

    #[inline]
    fn raw_lock(&self) {
        self.0.set(Arch::irq_disable());
    }

    #[inline]
    fn raw_unlock(&self) {
        Arch::irq_restore(self.0.get());
    }
}

/// A spinlock that is also a critical section: taking it disables
/// interrupts, and dropping the guard restores whatever state they were
/// in before. Safe to nest with other `IrqLock`s (each independently
/// saves/restores the interrupt-enable flag it observed).
pub struct IrqLock<T> {
    lock: IrqLockRaw,
    inner: UnsafeCell<T>,
}

impl<T> IrqLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            lock: IrqLockRaw::new(),
            inner: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> IrqGuard<'_, T> {
        self.lock.raw_lock();
        IrqGuard { lock: self }
    }
}

unsafe impl<T> Sync for IrqLock<T> {}

pub struct IrqGuard<'a, T> {
    lock: &'a IrqLock<T>,
}

impl<T> Deref for IrqGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T> DerefMut for IrqGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T> Drop for IrqGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw_unlock();
    }
}

/// An interrupt vector handler. Handlers never suspend: they may only call
/// the kernel's from-IRQ API (`thread_wakeup`, `mbox_try_send`, ...).
pub type IrqHandler = fn();

#[derive(Clone, Copy)]
struct Slot {
    handler: IrqHandler,
    #[allow(dead_code)] // read back by platform glue that programs the NVIC/GIC/PLIC priority.
    priority: u8,
}

static TABLE: IrqLock<[Option<Slot>; MAX_IRQS]> = IrqLock::new([None; MAX_IRQS]);

/// Active nesting depth. Incremented/decremented from IRQ context only,
/// where nested entry is inherently serialized on a single core, so a
/// plain atomic (no `IrqLock`) is both correct and cheap.
static IRQ_DEPTH: AtomicU32 = AtomicU32::new(0);

/// `true` while any IRQ handler (at any nesting depth) is executing.
#[inline]
pub fn is_in_irq() -> bool {
    IRQ_DEPTH.load(Ordering::Acquire) != 0
}

#[inline]
pub fn depth() -> u32 {
    IRQ_DEPTH.load(Ordering::Acquire)
}

/// Installs `handler` for `vector` at hardware `priority`, overwriting any
/// previous handler. The vector is expected to already be unmasked by the
/// board's interrupt controller glue; this call only manages the kernel's
/// side of the table.
pub fn irq_register(vector: usize, handler: IrqHandler, priority: u8) -> Result<(), Error> {
    if vector >= MAX_IRQS {
        return Err(Error::InvalidVector);
    }
    let mut table = TABLE.lock();
    table[vector] = Some(Slot { handler, priority });
    Ok(())
}

/// Masks `vector`'s kernel-side dispatch and drops its handler.
pub fn irq_unregister(vector: usize) -> Result<(), Error> {
    if vector >= MAX_IRQS {
        return Err(Error::InvalidVector);
    }
    let mut table = TABLE.lock();
    table[vector] = None;
    Ok(())
}

/// Called from the platform's low-level vector stub. Firing an
/// unregistered vector is a programming error in the board's interrupt
/// masking and is unrecoverable.
pub fn on_irq_entry(vector: usize) {
    IRQ_DEPTH.fetch_add(1, Ordering::AcqRel);
    let handler = {
        let table = TABLE.lock();
        table[vector].map(|s| s.handler)
    };
    match handler {
        Some(h) => h(),
        None => panic!("unregistered IRQ vector {vector} fired"),
    }
    IRQ_DEPTH.fetch_sub(1, Ordering::AcqRel);
}

/// Called at the tail of the platform's low-level vector stub, after
/// `on_irq_entry` returns. Performs the deferred context switch if this is
/// the outermost IRQ return and a wakeup during the burst asked for one.
pub fn on_irq_exit() {
    if IRQ_DEPTH.load(Ordering::Acquire) == 0 {
        scheduler::reschedule_if_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_clears_slot() {
        fn handler() {}
        assert!(irq_register(3, handler, 5).is_ok());
        assert!(irq_unregister(3).is_ok());
        let table = TABLE.lock();
        assert!(table[3].is_none());
    }

    #[test]
    fn out_of_range_vector_is_rejected() {
        fn handler() {}
        assert_eq!(irq_register(MAX_IRQS, handler, 0), Err(Error::InvalidVector));
        assert_eq!(irq_unregister(MAX_IRQS), Err(Error::InvalidVector));
    }

    #[test]
    fn depth_tracks_entry_and_exit() {
        fn handler() {
            assert_eq!(depth(), 1);
        }
        assert!(irq_register(4, handler, 0).is_ok());
        assert_eq!(depth(), 0);
        on_irq_entry(4);
        assert_eq!(depth(), 0);
        irq_unregister(4).unwrap();
    }
}
