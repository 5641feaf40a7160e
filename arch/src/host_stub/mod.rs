//! Host stand-in for the real CPU ports.
//!
//! Neither `arm_cortex_m` nor `aarch64_cortex_a` compiles off-target, but the
//! kernel crate still needs a concrete `Arch` to type-check when built for
//! the host (`cargo test`, `cargo doc`). This backend satisfies the same
//! shape as a real port; only `irq_disable`/`irq_restore` do anything real
//! (a process-wide recursion counter, good enough to make the kernel's
//! nesting assumptions hold under a single host test thread). `stack_init`
//! and `context_switch` are not wired to any real execution context and are
//! unreachable from the kernel's host-side unit tests, which exercise only
//! the pure scheduling decisions and never ask for a live switch.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{ThreadEntry, ThreadExit};

pub struct Arch;

static DEPTH: AtomicUsize = AtomicUsize::new(0);

impl Arch {
    #[inline]
    pub fn irq_disable() -> usize {
        DEPTH.fetch_add(1, Ordering::AcqRel)
    }

    #[inline]
    pub fn irq_restore(state: usize) {
        DEPTH.store(state, Ordering::Release);
    }

    /// # Safety
    /// Unreachable from host tests; see module docs.
    pub unsafe fn context_switch(_from_sp_slot: *mut usize, _to_sp: usize) {
        unreachable!("host_stub::Arch::context_switch has no execution context to switch into")
    }

    pub fn stack_init(
        stack: &mut [u8],
        _entry: ThreadEntry,
        _arg: usize,
        _on_exit: ThreadExit,
    ) -> usize {
        stack.as_mut_ptr() as usize + stack.len()
    }

    #[inline]
    pub fn cpu_idle_wait() {}
}
