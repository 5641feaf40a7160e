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

//! Build-time configuration. Everything here is a plain `const`, usable in
//! array-length position, because a kernel of this kind is sized once per
//! board rather than reconfigured at runtime.

/// Number of priority levels, 0 (highest) .. `PRIO_LEVELS - 1` (idle).
pub const PRIO_LEVELS: usize = 32;

/// Size of the statically-allocated thread-control-block pool.
pub const MAX_THREADS: usize = 32;

/// Number of platform IRQ vectors the dispatcher can register.
pub const MAX_IRQS: usize = 64;

/// Rate of the periodic tick interrupt.
pub const TICK_HZ: u32 = 1000;

/// Bytes reserved for the idle thread's stack.
pub const IDLE_STACK_SIZE: usize = 512;

/// Quantum, in ticks, a round-robin-scheduled thread runs before being
/// moved to the tail of its priority queue. Only meaningful with the
/// `round_robin` feature enabled.
pub const TIME_SLICE_TICKS: u32 = 10;

const _: () = assert!(PRIO_LEVELS >= 2 && PRIO_LEVELS <= 64, "PRIO_LEVELS out of range");
const _: () = assert!(MAX_THREADS >= 1 && MAX_THREADS <= 128, "MAX_THREADS out of range");
const _: () = assert!(MAX_IRQS > 0, "MAX_IRQS must be non-zero");

/// The idle thread always occupies the lowest priority.
pub const IDLE_PRIORITY: u8 = (PRIO_LEVELS - 1) as u8;

/// Default priority for a board's "main" application thread: the midpoint
/// of the priority range, leaving room above and below for drivers and
/// background work. Supplemental convenience, not a primitive.
pub const PRIORITY_MAIN: u8 = (PRIO_LEVELS / 2) as u8;

/// Default stack size new callers size their threads against.
pub const STACKSIZE_DEFAULT: usize = 2048;

/// Named stack-size tiers layered over [`STACKSIZE_DEFAULT`]. A caller that
/// does not want to hand-pick a byte count uses one of these instead.
pub const STACKSIZE_TINY: usize = STACKSIZE_DEFAULT / 4;
pub const STACKSIZE_SMALL: usize = STACKSIZE_DEFAULT / 2;
pub const STACKSIZE_MEDIUM: usize = STACKSIZE_DEFAULT;
pub const STACKSIZE_LARGE: usize = STACKSIZE_DEFAULT * 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_tiers_are_monotonic() {
        assert!(STACKSIZE_TINY < STACKSIZE_SMALL);
        assert!(STACKSIZE_SMALL < STACKSIZE_MEDIUM);
        assert!(STACKSIZE_MEDIUM < STACKSIZE_LARGE);
        assert!(STACKSIZE_LARGE < usize::MAX / 2);
    }

    #[test]
    fn priority_main_is_between_highest_and_idle() {
        assert!(PRIORITY_MAIN > 0);
        assert!((PRIORITY_MAIN as usize) < IDLE_PRIORITY as usize);
    }
}
