//! CPU-abstraction port.
//!
//! Exposes exactly the four operations the scheduler needs from hardware:
//! interrupt masking, a context switch between two thread stacks, synthesis
//! of a fresh thread's initial stack frame, and a low-power wait for the
//! idle thread. Everything else (vector tables, board bring-up, peripheral
//! drivers) is a collaborator's problem, not this crate's.
#![no_std]
#![feature(naked_functions)]
#![feature(stmt_expr_attributes)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod arm_cortex_m;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use arm_cortex_m::Arch;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod aarch64_cortex_a;
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use aarch64_cortex_a::Arch;

// Neither real port applies off-target (host `cargo test` builds, doc builds).
// This backend lets the kernel crate compile uniformly there; its
// `context_switch` is unreachable in practice because the kernel's host
// tests exercise only the pure scheduling decisions, never a live switch.
#[cfg(not(any(
    all(target_arch = "arm", target_os = "none"),
    all(target_arch = "aarch64", target_os = "none")
)))]
pub mod host_stub;
#[cfg(not(any(
    all(target_arch = "arm", target_os = "none"),
    all(target_arch = "aarch64", target_os = "none")
)))]
pub use host_stub::Arch;

/// Thread entry point: called with the creation-time argument.
pub type ThreadEntry = extern "C" fn(usize);
/// Thread-terminated trampoline; `stack_init` arranges for this to be
/// reached when `entry` returns.
pub type ThreadExit = extern "C" fn() -> !;

/// Operations every port (`Arch`) below must provide. Not used as a trait
/// object anywhere in the kernel -- `Arch` is a zero-sized type selected at
/// compile time by target, and these are its inherent `fn`s -- but stated
/// here once so the contract is visible independent of which port is
/// linked in.
pub trait Port {
    /// Disable interrupts, returning an opaque prior state. Nests: two
    /// disables followed by two restores (in reverse order) leave
    /// interrupts exactly as they were found.
    fn irq_disable() -> usize;
    /// Restore a state previously returned by `irq_disable`.
    fn irq_restore(state: usize);
    /// Switch stacks. `from_sp_slot`, if non-null, receives the outgoing
    /// stack pointer; pass null on the very first switch out of the boot
    /// stack. `to_sp` is the incoming thread's saved stack pointer.
    ///
    /// # Safety
    /// `to_sp` must have been produced by `stack_init` or by a previous
    /// `context_switch` out of a live thread; `from_sp_slot`, if non-null,
    /// must point at storage the caller owns exclusively.
    unsafe fn context_switch(from_sp_slot: *mut usize, to_sp: usize);
    /// Synthesize an initial stack frame over `stack` such that switching
    /// into the returned stack pointer resumes execution at
    /// `entry(arg)`, with `on_exit` as the return address reached if
    /// `entry` returns.
    fn stack_init(stack: &mut [u8], entry: ThreadEntry, arg: usize, on_exit: ThreadExit) -> usize;
    /// Block until the next interrupt, with interrupts enabled for the
    /// duration of the wait (no missed-wakeup window). Idle thread only.
    fn cpu_idle_wait();
}
