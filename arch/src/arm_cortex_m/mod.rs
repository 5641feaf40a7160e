//! ARM Cortex-M port.
//!
//! The switch is a plain function call, not an exception (PendSV-style
//! switching is a valid alternative per the port contract, but a direct
//! call keeps the synthesized stack frame and the trampoline in one place
//! and is easier to reason about without a simulator).

use core::sync::atomic::{compiler_fence, Ordering};

use crate::{ThreadEntry, ThreadExit};

pub struct Arch;

impl Arch {
    #[inline]
    pub fn irq_disable() -> usize {
        let was_active = cortex_m::register::primask::read().is_active();
        cortex_m::interrupt::disable();
        compiler_fence(Ordering::SeqCst);
        was_active as usize
    }

    #[inline]
    pub fn irq_restore(state: usize) {
        compiler_fence(Ordering::SeqCst);
        if state != 0 {
            unsafe { cortex_m::interrupt::enable() };
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
        const FRAME_WORDS: usize = 9; // r4-r11, lr

        let base = stack.as_mut_ptr() as usize;
        let top = (base + stack.len()) & !0x7;
        let sp = top - FRAME_WORDS * core::mem::size_of::<u32>();
        let words = sp as *mut u32;
        unsafe {
            words.add(0).write(arg as u32); // r4: entry argument
            words.add(1).write(entry as usize as u32); // r5: entry fn
            words.add(2).write(on_exit as usize as u32); // r6: on-exit fn
            words.add(3).write(0); // r7
            words.add(4).write(0); // r8
            words.add(5).write(0); // r9
            words.add(6).write(0); // r10
            words.add(7).write(0); // r11
            words.add(8).write(thread_entry_trampoline as usize as u32); // lr
        }
        sp
    }

    #[inline]
    pub fn cpu_idle_wait() {
        unsafe {
            core::arch::asm!("cpsie i", "wfi", options(nomem, nostack, preserves_flags));
        }
    }
}

/// Reached via `lr` after the synthesized frame is popped for the first
/// time. Moves the arguments a real caller would have passed in r0 out of
/// the callee-saved registers `stack_init` stashed them in, then jumps to
/// `entry` with `lr` already pointing at `on_exit`.
#[naked]
unsafe extern "C" fn thread_entry_trampoline() -> ! {
    core::arch::asm!("mov r0, r4", "mov lr, r6", "bx r5", options(noreturn));
}

#[naked]
unsafe extern "C" fn raw_context_switch(_from_sp_slot: *mut usize, _to_sp: usize) {
    core::arch::asm!(
        "push {{r4-r11, lr}}",
        "cmp r0, #0",
        "beq 1f",
        "str sp, [r0]",
        "1:",
        "mov sp, r1",
        "pop {{r4-r11, lr}}",
        "bx lr",
        options(noreturn)
    );
}
