//! AArch64 (Cortex-A, EL1) port.

mod stack_frame;

use crate::{ThreadEntry, ThreadExit};
use stack_frame::StackFrame;

pub struct Arch;

const SPSR_EL1H_NO_MASK: u64 = 0b0101;

impl Arch {
    #[inline]
    pub fn irq_disable() -> usize {
        let daif: u64;
        unsafe {
            core::arch::asm!("mrs {0}, daif", out(reg) daif);
            core::arch::asm!("msr daifset, #2");
        }
        daif as usize
    }

    #[inline]
    pub fn irq_restore(state: usize) {
        unsafe {
            core::arch::asm!("msr daif, {0}", in(reg) state as u64);
        }
    }

    /// # Safety
    /// See [`crate::Port::context_switch`].
    #[inline]
    pub unsafe fn context_switch(from_sp_slot: *mut usize, to_sp: usize) {
        raw_context_switch(from_sp_slot, to_sp)
    }

    pub fn stack_init(
        stack: &mut [u8],
        entry: ThreadEntry,
        arg: usize,
        on_exit: ThreadExit,
    ) -> usize {
        let base = stack.as_mut_ptr() as usize;
        let top = (base + stack.len()) & !0xf; // SP must be 16-byte aligned
        let sp = top - core::mem::size_of::<StackFrame>();
        let frame = sp as *mut StackFrame;
        unsafe {
            frame.write(StackFrame {
                elr: entry as usize as u64,
                spsr: SPSR_EL1H_NO_MASK,
                xzr: 0,
                lr: on_exit as usize as u64,
                fp: 0,
                x0: arg as u64,
                x1: 0,
                x2: 0,
                x3: 0,
                x4: 0,
                x5: 0,
                x6: 0,
                x7: 0,
                x8: 0,
                x9: 0,
                x10: 0,
                x11: 0,
                x12: 0,
                x13: 0,
                x14: 0,
                x15: 0,
                x16: 0,
                x17: 0,
                x18: 0,
                x19: 0,
                x20: 0,
                x21: 0,
                x22: 0,
                x23: 0,
                x24: 0,
                x25: 0,
                x26: 0,
                x27: 0,
                x28: 0,
            });
        }
        sp
    }

    #[inline]
    pub fn cpu_idle_wait() {
        unsafe {
            core::arch::asm!("msr daifclr, #2", "wfi", options(nomem, nostack));
        }
    }
}

/// Switches to `to_sp`'s saved context, restoring callee-saved registers
/// plus `elr`/`spsr` and returning via `eret`. When `from_sp_slot` is
/// non-null, first saves the current context in the same layout and
/// records the resulting stack pointer. `from_sp_slot` is null only for
/// the very first switch out of the boot stack, in which case nothing is
/// saved.
///
/// The outgoing thread resumes later at the matching `eret` below, inside
/// its own prior call to this function -- there is no separate "mid
/// switch" hook to release a scheduler lock, because on a single core the
/// only lock is "interrupts disabled", and that state is restored by
/// whichever thread's own call stack unwinds back through its own
/// `irq_restore`.
#[naked]
unsafe extern "C" fn raw_context_switch(_from_sp_slot: *mut usize, _to_sp: usize) {
    core::arch::asm!(
        "cbz x0, 2f",
        "sub sp, sp, #272",
        "stp x0, x1, [sp, #256]",
        "stp x2, x3, [sp, #240]",
        "stp x4, x5, [sp, #224]",
        "stp x6, x7, [sp, #208]",
        "stp x8, x9, [sp, #192]",
        "stp x10, x11, [sp, #176]",
        "stp x12, x13, [sp, #160]",
        "stp x14, x15, [sp, #144]",
        "stp x16, x17, [sp, #128]",
        "stp x18, x19, [sp, #112]",
        "stp x20, x21, [sp, #96]",
        "stp x22, x23, [sp, #80]",
        "stp x24, x25, [sp, #64]",
        "stp x26, x27, [sp, #48]",
        "stp x28, x29, [sp, #32]",
        "mrs x9, elr_el1",
        "mrs x10, spsr_el1",
        "stp xzr, x30, [sp, #16]",
        "stp x9, x10, [sp, #0]",
        "mov x9, sp",
        "str x9, [x0]",
        "2:",
        "mov sp, x1",
        "ldp x9, x10, [sp, #0]",
        "msr elr_el1, x9",
        "msr spsr_el1, x10",
        "ldp xzr, x30, [sp, #16]",
        "ldp x28, x29, [sp, #32]",
        "ldp x26, x27, [sp, #48]",
        "ldp x24, x25, [sp, #64]",
        "ldp x22, x23, [sp, #80]",
        "ldp x20, x21, [sp, #96]",
        "ldp x18, x19, [sp, #112]",
        "ldp x16, x17, [sp, #128]",
        "ldp x14, x15, [sp, #144]",
        "ldp x12, x13, [sp, #160]",
        "ldp x10, x11, [sp, #176]",
        "ldp x8, x9, [sp, #192]",
        "ldp x6, x7, [sp, #208]",
        "ldp x4, x5, [sp, #224]",
        "ldp x2, x3, [sp, #240]",
        "ldp x0, x1, [sp, #256]",
        "add sp, sp, #272",
        "eret",
        options(noreturn)
    );
}
