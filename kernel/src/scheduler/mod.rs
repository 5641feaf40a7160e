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

//! Fixed-priority preemptive scheduler.
//!
//! All scheduler state -- the TCB pool, the per-priority ready queues, the
//! timeout list and the current/idle thread -- lives in one `static`
//! [`Kernel`], guarded not by an [`crate::irq::IrqLock`] but by the bare
//! interrupts-disabled discipline: every entry point here brackets its
//! work with [`enter_critical`]/[`exit_critical`] itself, because several
//! of them (`thread_yield`, `thread_sleep`, ...) must keep interrupts
//! masked *across* an [`Arch::context_switch`] call, which an `IrqLock`
//! guard's `Drop` timing cannot express.
//!
//! Every public entry point here is a thin critical section wrapping a
//! pure decision (does a switch happen, and to whom) and, when one does,
//! a direct call into [`Arch::context_switch`]. The decision halves are
//! unit-tested on the host; the switch halves are not -- they have
//! nothing to switch into off-target.

pub mod thread;
pub mod timeout;
pub mod wait_queue;

use core::ptr::NonNull;

use kestrel_arch::{Arch, ThreadEntry};

use crate::config;
use crate::error::{Error, Result};
pub use thread::{Msg, Pool, RunState, ThreadId, WaitOutcome};
use timeout::TimeoutList;
pub use wait_queue::{InsertMode, WaitQueue};

/// Below this, a synthetic stack frame plus a realistic call depth won't
/// fit; `thread_create` rejects anything smaller outright.
const MIN_STACK_BYTES: usize = 64;

struct Kernel {
    pool: Pool,
    ready: [WaitQueue; config::PRIO_LEVELS],
    ready_bitmap: u64,
    current: Option<ThreadId>,
    idle: Option<ThreadId>,
    reschedule_pending: bool,
    ticks: u32,
    timeouts: TimeoutList,
}

impl Kernel {
    const fn new() -> Self {
        Self {
            pool: Pool::new(),
            ready: [const { WaitQueue::new() }; config::PRIO_LEVELS],
            ready_bitmap: 0,
            current: None,
            idle: None,
            reschedule_pending: false,
            ticks: 0,
            timeouts: TimeoutList::new(),
        }
    }

    fn push_ready(&mut self, id: ThreadId) {
        let priority = self.pool.get(id).priority as usize;
        self.pool.get_mut(id).state = RunState::Ready;
        self.ready[priority].insert(&mut self.pool, id, InsertMode::Fifo);
        self.ready_bitmap |= 1 << priority;
    }

    /// Pops the highest-priority ready thread, or the idle thread if the
    /// ready set is empty. Idle itself is never a ready-set member: it is
    /// dispatched directly whenever nothing else wants the CPU.
    fn pick_next(&mut self) -> ThreadId {
        match highest_set_priority(self.ready_bitmap) {
            Some(priority) => {
                let id = self.ready[priority]
                    .pop_front(&mut self.pool)
                    .expect("bitmap bit set implies a non-empty queue");
                if self.ready[priority].is_empty() {
                    self.ready_bitmap &= !(1 << priority);
                }
                id
            }
            None => self.idle.expect("scheduler not initialized"),
        }
    }
}

fn highest_set_priority(bitmap: u64) -> Option<usize> {
    if bitmap == 0 {
        None
    } else {
        Some(bitmap.trailing_zeros() as usize)
    }
}

fn should_preempt(current_priority: u8, candidate_priority: u8) -> bool {
    candidate_priority < current_priority
}

struct KernelCell(core::cell::UnsafeCell<Kernel>);
unsafe impl Sync for KernelCell {}
static KERNEL: KernelCell = KernelCell(core::cell::UnsafeCell::new(Kernel::new()));

/// # Safety
/// Caller must hold the critical section (a live [`enter_critical`] whose
/// matching [`exit_critical`] has not yet run) for as long as the
/// reference is used.
#[inline]
unsafe fn kernel() -> &'static mut Kernel {
    &mut *KERNEL.0.get()
}

#[inline]
pub(crate) fn enter_critical() -> usize {
    Arch::irq_disable()
}

/// # Safety
/// `state` must be the value a matching [`enter_critical`] returned, with
/// no other `exit_critical` having already consumed it.
#[inline]
pub(crate) unsafe fn exit_critical(state: usize) {
    Arch::irq_restore(state);
}

/// Requeues the calling thread (still `Running`) to the tail of its own
/// priority level and returns whoever should run next. Used by voluntary
/// yield, deferred preemption and round-robin quantum expiry, where the
/// caller is not blocked, just giving up the CPU. Idle is never pushed:
/// it is not a ready-set member, and `pick_next` already falls back to it.
fn requeue_current_and_pick_next(k: &mut Kernel) -> ThreadId {
    let current = k.current.expect("scheduler not initialized");
    if Some(current) != k.idle {
        k.push_ready(current);
    }
    k.pick_next()
}

/// Picks whoever should run next after the caller has already transitioned
/// itself out of `Running` (blocked, sleeping, or terminated) and is not
/// eligible to be re-picked.
fn pick_next_only(k: &mut Kernel) -> ThreadId {
    k.pick_next()
}

/// Performs the physical switch from `k.current` to `next`, if they
/// differ. Not host-testable: `next`'s saved stack pointer only resumes
/// somewhere real on an actual CPU port.
fn dispatch(k: &mut Kernel, next: ThreadId) {
    let current = k.current.expect("scheduler not initialized");
    if next == current {
        let tcb = k.pool.get_mut(current);
        tcb.state = RunState::Running;
        reset_time_slice(tcb);
        return;
    }
    {
        let outgoing = k.pool.get(current);
        assert!(
            crate::stack::check(outgoing.stack_base, outgoing.stack_size),
            "stack overflow in thread {current:?}"
        );
    }
    let tcb = k.pool.get_mut(next);
    tcb.state = RunState::Running;
    reset_time_slice(tcb);
    k.current = Some(next);
    let from_sp_slot: *mut usize = &mut k.pool.get_mut(current).sp;
    let to_sp = k.pool.get(next).sp;
    unsafe { Arch::context_switch(from_sp_slot, to_sp) };
}

#[cfg(feature = "round_robin")]
fn reset_time_slice(tcb: &mut thread::Tcb) {
    tcb.time_slice = config::TIME_SLICE_TICKS;
}

#[cfg(not(feature = "round_robin"))]
fn reset_time_slice(_tcb: &mut thread::Tcb) {}

/// Makes `id` ready and, if it outranks the running thread, preempts: at
/// once from thread context, or deferred to the outermost
/// [`crate::irq::on_irq_exit`] if called from inside an IRQ handler.
fn make_ready_and_maybe_preempt(k: &mut Kernel, id: ThreadId) {
    k.push_ready(id);
    let current = k.current.expect("scheduler not initialized");
    if !should_preempt(k.pool.get(current).priority, k.pool.get(id).priority) {
        return;
    }
    if crate::irq::is_in_irq() {
        k.reschedule_pending = true;
    } else {
        let next = k.pick_next();
        dispatch(k, next);
    }
}

/// `0`: never started. `1`: one caller is running `init`. `2`: done.
/// On a real target `init` runs once, before interrupts are even on, so
/// this CAS is uncontended; it earns its keep on the host, where multiple
/// `#[test]` functions each call `init` from their own OS thread.
static INIT_STATE: core::sync::atomic::AtomicU8 = core::sync::atomic::AtomicU8::new(0);

/// Brings the scheduler up: installs `idle` as the thread that runs
/// whenever the ready set is empty. Idempotent and safe to call from
/// more than one caller concurrently -- only the first actually runs
/// the setup; the rest block until it has published the result.
pub fn init(idle_entry: ThreadEntry, idle_stack: &mut [u8]) {
    use core::sync::atomic::Ordering;

    if INIT_STATE
        .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        while INIT_STATE.load(Ordering::Acquire) != 2 {
            core::hint::spin_loop();
        }
        return;
    }

    let state = enter_critical();
    let k = unsafe { kernel() };
    crate::stack::prepare(idle_stack);
    let sp = Arch::stack_init(idle_stack, idle_entry, 0, idle_on_exit);
    let id = k
        .pool
        .allocate(
            idle_entry,
            0,
            Some("idle"),
            idle_stack.as_ptr() as usize,
            idle_stack.len(),
            config::IDLE_PRIORITY,
            sp,
        )
        .expect("a fresh pool always has room for the first thread");
    k.pool.get_mut(id).state = RunState::Running;
    k.idle = Some(id);
    k.current = Some(id);
    unsafe { exit_critical(state) };
    INIT_STATE.store(2, Ordering::Release);
}

extern "C" fn idle_on_exit() -> ! {
    panic!("idle thread must never return");
}

extern "C" fn thread_on_exit() -> ! {
    retire_current();
    unreachable!("a terminated thread is never dispatched again");
}

/// Detaches the terminated thread's TCB and frees its pool slot before
/// switching away. Does not go through [`dispatch`]: that function reads
/// the outgoing thread's saved state to preserve it, but a terminated
/// thread is never resumed, so there is nothing to preserve, and its slot
/// must be freed before we lose the ability to run any more code on its
/// behalf -- this call never returns on real hardware.
fn retire_current() {
    // Interrupts stay masked for the rest of this call; there is no
    // matching `exit_critical` because this stack is never resumed -- the
    // next thread's own saved state reinstates interrupt masking when it
    // is dispatched, exactly as it would on any other context switch.
    let _state = enter_critical();
    let k = unsafe { kernel() };
    let current = k.current.expect("scheduler not initialized");
    {
        let outgoing = k.pool.get_mut(current);
        assert!(
            crate::stack::check(outgoing.stack_base, outgoing.stack_size),
            "stack overflow in thread {current:?}"
        );
        outgoing.state = RunState::Terminated;
    }
    k.pool.free(current);
    let next = pick_next_only(k);
    let tcb = k.pool.get_mut(next);
    tcb.state = RunState::Running;
    reset_time_slice(tcb);
    k.current = Some(next);
    let to_sp = k.pool.get(next).sp;
    // SAFETY: `current`'s slot is already freed, so there is no outgoing
    // stack pointer to save; passing null tells the port not to save one,
    // the same sentinel used for the very first switch out of the boot
    // stack.
    unsafe { Arch::context_switch(core::ptr::null_mut(), to_sp) };
}

/// Creates a new thread and makes it ready. `stack` must outlive the
/// thread (typically `'static`); ownership of its contents passes to the
/// kernel, which treats it as raw storage for the synthetic frame and the
/// thread's own stack growth.
pub fn thread_create(
    stack: &'static mut [u8],
    priority: u8,
    entry: ThreadEntry,
    arg: usize,
    name: Option<&'static str>,
) -> Result<ThreadId> {
    if priority as usize >= config::PRIO_LEVELS {
        return Err(Error::InvalidPriority);
    }
    if stack.len() < MIN_STACK_BYTES || (stack.as_ptr() as usize) % core::mem::align_of::<usize>() != 0 {
        return Err(Error::InvalidStack);
    }
    crate::stack::prepare(stack);
    let state = enter_critical();
    let k = unsafe { kernel() };
    let sp = Arch::stack_init(stack, entry, arg, thread_on_exit);
    let id = k
        .pool
        .allocate(entry, arg, name, stack.as_ptr() as usize, stack.len(), priority, sp);
    let result = match id {
        Some(id) => {
            make_ready_and_maybe_preempt(k, id);
            Ok(id)
        }
        None => Err(Error::TooManyThreads),
    };
    unsafe { exit_critical(state) };
    result
}

/// Gives up the CPU to the highest-priority ready thread, if any is ready
/// at or above the caller's own priority; otherwise returns immediately.
pub fn thread_yield() {
    let state = enter_critical();
    let k = unsafe { kernel() };
    let next = requeue_current_and_pick_next(k);
    dispatch(k, next);
    unsafe { exit_critical(state) };
}

/// Blocks the caller for `ticks` timer ticks. `0` is a bare yield.
pub fn thread_sleep(ticks: u32) {
    if ticks == 0 {
        thread_yield();
        return;
    }
    let state = enter_critical();
    let k = unsafe { kernel() };
    let current = k.current.expect("scheduler not initialized");
    k.pool.get_mut(current).state = RunState::BlockSleep;
    // SAFETY: no queue to unlink from; the entry only ever expires.
    unsafe { k.timeouts.schedule(current, ticks, None) };
    let next = pick_next_only(k);
    dispatch(k, next);
    unsafe { exit_critical(state) };
}

/// Wakes a thread blocked in [`thread_sleep`] early. Threads blocked on a
/// mutex or mailbox are woken by those primitives, not this call, since
/// only they know how to unlink the thread from their own wait queue.
pub fn thread_wakeup(id: ThreadId) -> Result<()> {
    let state = enter_critical();
    let k = unsafe { kernel() };
    if !k.pool.is_live(id) || k.pool.get(id).state != RunState::BlockSleep {
        unsafe { exit_critical(state) };
        return Err(Error::InvalidHandle);
    }
    k.timeouts.cancel(id);
    k.pool.get_mut(id).wait_outcome = WaitOutcome::Satisfied;
    make_ready_and_maybe_preempt(k, id);
    unsafe { exit_critical(state) };
    Ok(())
}

/// The calling thread's own id.
pub fn thread_current() -> ThreadId {
    let state = enter_critical();
    let id = unsafe { kernel() }.current.expect("scheduler not initialized");
    unsafe { exit_critical(state) };
    id
}

/// Current tick count, wrapping every `u32::MAX` ticks.
pub fn tick_now() -> u32 {
    let state = enter_critical();
    let ticks = unsafe { kernel() }.ticks;
    unsafe { exit_critical(state) };
    ticks
}

/// Advances the clock by one tick, waking anything whose timeout just
/// expired. Called from the timer ISR; always runs with `irq::is_in_irq()`
/// true, so any preemption it triggers is deferred to `on_irq_exit`.
pub(crate) fn on_tick() {
    let state = enter_critical();
    let k = unsafe { kernel() };
    k.ticks = k.ticks.wrapping_add(1);

    let mut expired: [Option<(ThreadId, Option<NonNull<WaitQueue>>)>; config::MAX_THREADS] =
        [None; config::MAX_THREADS];
    let mut count = 0;
    for item in k.timeouts.tick() {
        expired[count] = Some(item);
        count += 1;
    }
    for slot in &expired[..count] {
        let (id, queue) = slot.expect("count tracks exactly the entries written above");
        if let Some(mut q) = queue {
            // SAFETY: the primitive that registered this timeout is still
            // alive (it owns `id`'s block in the first place).
            unsafe { q.as_mut().remove(&mut k.pool, id) };
        }
        k.pool.get_mut(id).wait_outcome = WaitOutcome::TimedOut;
        make_ready_and_maybe_preempt(k, id);
    }
    tick_time_slice(k);
    unsafe { exit_critical(state) };
}

/// Round-robin quantum: on expiry, the running thread is requeued to the
/// tail of its own priority level. Deferred to `on_irq_exit` like any other
/// reschedule triggered from tick context -- `on_tick` never dispatches
/// directly.
#[cfg(feature = "round_robin")]
fn tick_time_slice(k: &mut Kernel) {
    let current = k.current.expect("scheduler not initialized");
    if Some(current) == k.idle {
        return;
    }
    let tcb = k.pool.get_mut(current);
    tcb.time_slice = tcb.time_slice.saturating_sub(1);
    if tcb.time_slice == 0 {
        k.reschedule_pending = true;
    }
}

#[cfg(not(feature = "round_robin"))]
fn tick_time_slice(_k: &mut Kernel) {}

/// Called at the outermost IRQ exit; performs the switch a wakeup during
/// the burst asked for but deferred.
pub(crate) fn reschedule_if_pending() {
    let state = enter_critical();
    let k = unsafe { kernel() };
    if k.reschedule_pending {
        k.reschedule_pending = false;
        let next = requeue_current_and_pick_next(k);
        dispatch(k, next);
    }
    unsafe { exit_critical(state) };
}

// -- Internal API consumed by `sync::{mutex, mailbox}` --------------------
//
// A mutex or mailbox owns its own `WaitQueue` but has no way to reach the
// pool or the ready set on its own; these functions are the seam. Every
// one of them assumes the caller already holds the critical section
// (via `enter_critical`), exactly like the public entry points above.

/// The calling thread's id, for use by a sync primitive that already
/// holds the critical section.
///
/// # Safety
/// Caller must hold the critical section.
pub(crate) unsafe fn current_unchecked() -> ThreadId {
    kernel().current.expect("scheduler not initialized")
}

/// Blocks the calling thread on `queue` (inserted per `mode`) and switches
/// away. Returns the outcome once the thread is resumed: either something
/// woke it (`Satisfied`), via [`wake_one`], or nothing did before `ticks`
/// elapsed (`TimedOut`) -- timeouts only apply when `ticks` is `Some`.
///
/// # Safety
/// Caller must hold the critical section. `queue` must outlive the block
/// if `ticks` is `Some` (the timeout list keeps a raw pointer to it until
/// it fires or is cancelled by a subsequent [`wake_one`]).
pub(crate) unsafe fn block_on(
    queue: &mut WaitQueue,
    mode: InsertMode,
    new_state: RunState,
    ticks: Option<u32>,
) -> WaitOutcome {
    let k = kernel();
    let id = k.current.expect("scheduler not initialized");
    k.pool.get_mut(id).state = new_state;
    queue.insert(&mut k.pool, id, mode);
    if let Some(ticks) = ticks {
        let qptr = NonNull::from(&mut *queue);
        k.timeouts.schedule(id, ticks, Some(qptr));
    }
    let next = pick_next_only(k);
    dispatch(k, next);
    k.pool.get_mut(id).wait_outcome
}

/// Pops and readies the front of `queue` (whatever ordering the primitive
/// inserted it under), cancelling any pending timeout. Returns `None` if
/// `queue` was empty.
///
/// # Safety
/// Caller must hold the critical section.
pub(crate) unsafe fn wake_one(queue: &mut WaitQueue) -> Option<ThreadId> {
    let k = kernel();
    let id = queue.pop_front(&mut k.pool)?;
    ready_again_locked(k, id);
    Some(id)
}

/// Readies `id`, which the caller has already removed from whatever queue
/// it was blocked in (a mailbox handing a message straight to one side of
/// a rendezvous, for instance, without going through [`wake_one`]).
///
/// # Safety
/// Caller must hold the critical section.
pub(crate) unsafe fn ready_again(id: ThreadId) {
    ready_again_locked(kernel(), id);
}

fn ready_again_locked(k: &mut Kernel, id: ThreadId) {
    k.timeouts.cancel(id);
    k.pool.get_mut(id).wait_outcome = WaitOutcome::Satisfied;
    make_ready_and_maybe_preempt(k, id);
}

/// Direct access to the TCB pool, for a primitive that needs to read or
/// write a field ([`thread::Tcb::parked_msg`], in particular) on a thread
/// it has already identified.
///
/// # Safety
/// Caller must hold the critical section.
pub(crate) unsafe fn pool_mut() -> &'static mut Pool {
    &mut kernel().pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_set_priority_picks_the_lowest_numbered_bit() {
        assert_eq!(highest_set_priority(0), None);
        assert_eq!(highest_set_priority(0b1000), Some(3));
        assert_eq!(highest_set_priority(0b1010), Some(1));
    }

    #[test]
    fn should_preempt_requires_strictly_higher_priority() {
        assert!(should_preempt(10, 5));
        assert!(!should_preempt(10, 10));
        assert!(!should_preempt(5, 10));
    }

    #[test]
    fn thread_create_rejects_out_of_range_priority_before_touching_the_kernel() {
        static mut STACK: [u8; 256] = [0; 256];
        extern "C" fn entry(_: usize) {}
        let stack = unsafe { &mut *core::ptr::addr_of_mut!(STACK) };
        let result = thread_create(stack, config::PRIO_LEVELS as u8, entry, 0, None);
        assert_eq!(result, Err(Error::InvalidPriority));
    }

    #[test]
    fn thread_create_rejects_undersized_stack_before_touching_the_kernel() {
        static mut STACK: [u8; 8] = [0; 8];
        extern "C" fn entry(_: usize) {}
        let stack = unsafe { &mut *core::ptr::addr_of_mut!(STACK) };
        let result = thread_create(stack, 0, entry, 0, None);
        assert_eq!(result, Err(Error::InvalidStack));
    }

    // These build a `Kernel` directly rather than going through the global
    // `KERNEL` singleton, so they stay pure decisions with no dependency on
    // `Arch::context_switch` -- safe to run alongside every other test.
    extern "C" fn dummy_entry(_: usize) {}

    #[test]
    fn requeue_current_and_pick_next_does_not_make_idle_a_ready_member() {
        let mut k = Kernel::new();
        let idle = k.pool.allocate(dummy_entry, 0, None, 0, 0, config::IDLE_PRIORITY, 0).unwrap();
        k.idle = Some(idle);
        k.current = Some(idle);
        let next = requeue_current_and_pick_next(&mut k);
        assert_eq!(next, idle);
        assert_eq!(k.ready_bitmap, 0, "idle must never end up set in the ready bitmap");
    }

    #[test]
    fn requeue_current_and_pick_next_cycles_equal_priority_siblings() {
        let mut k = Kernel::new();
        let idle = k.pool.allocate(dummy_entry, 0, None, 0, 0, config::IDLE_PRIORITY, 0).unwrap();
        k.idle = Some(idle);
        let a = k.pool.allocate(dummy_entry, 0, None, 0, 0, 5, 0).unwrap();
        let b = k.pool.allocate(dummy_entry, 0, None, 0, 0, 5, 0).unwrap();
        k.push_ready(b);
        k.current = Some(a);
        let next = requeue_current_and_pick_next(&mut k);
        assert_eq!(next, b);
    }

    #[cfg(feature = "round_robin")]
    #[test]
    fn tick_time_slice_requests_a_reschedule_once_exhausted() {
        let mut k = Kernel::new();
        let idle = k.pool.allocate(dummy_entry, 0, None, 0, 0, config::IDLE_PRIORITY, 0).unwrap();
        k.idle = Some(idle);
        let a = k.pool.allocate(dummy_entry, 0, None, 0, 0, 5, 0).unwrap();
        k.current = Some(a);
        k.pool.get_mut(a).time_slice = 2;
        tick_time_slice(&mut k);
        assert!(!k.reschedule_pending);
        assert_eq!(k.pool.get(a).time_slice, 1);
        tick_time_slice(&mut k);
        assert!(k.reschedule_pending);
        assert_eq!(k.pool.get(a).time_slice, 0);
    }

    #[cfg(feature = "round_robin")]
    #[test]
    fn tick_time_slice_never_touches_idle() {
        let mut k = Kernel::new();
        let idle = k.pool.allocate(dummy_entry, 0, None, 0, 0, config::IDLE_PRIORITY, 0).unwrap();
        k.idle = Some(idle);
        k.current = Some(idle);
        k.pool.get_mut(idle).time_slice = 1;
        tick_time_slice(&mut k);
        assert!(!k.reschedule_pending);
        assert_eq!(k.pool.get(idle).time_slice, 1, "idle's quantum is never consumed");
    }
}
