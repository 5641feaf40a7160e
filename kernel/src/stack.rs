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

//! Stack overflow detection for the `stack_guard` feature: a sentinel word
//! is written at the lowest address of a fresh stack, and checked on every
//! context switch away from that thread. A thread that grew its stack down
//! into the sentinel has overflowed, and we panic rather than let it
//! corrupt whatever the guard word lands next to.

#[cfg(feature = "stack_guard")]
const GUARD_WORD: usize = 0xdead_beef;

/// Plants the guard word. Call once, before the thread's first dispatch.
#[allow(unused_variables)]
pub fn prepare(stack: &mut [u8]) {
    #[cfg(feature = "stack_guard")]
    {
        if stack.len() >= core::mem::size_of::<usize>() {
            // SAFETY: `stack` is valid for writes for its whole length and
            // at least one `usize` wide, checked above.
            unsafe { (stack.as_mut_ptr() as *mut usize).write(GUARD_WORD) };
        }
    }
}

/// Returns `false` if the guard word at the base of `[stack_base,
/// stack_base + stack_size)` has been overwritten.
#[allow(unused_variables)]
pub fn check(stack_base: usize, stack_size: usize) -> bool {
    #[cfg(feature = "stack_guard")]
    {
        if stack_size < core::mem::size_of::<usize>() {
            return true;
        }
        // SAFETY: `stack_base` is a live thread's stack base, planted by
        // `prepare` above and never freed while the thread exists.
        unsafe { (stack_base as *const usize).read() == GUARD_WORD }
    }
    #[cfg(not(feature = "stack_guard"))]
    {
        true
    }
}

#[cfg(all(test, feature = "stack_guard"))]
mod tests {
    use super::*;

    #[test]
    fn intact_guard_passes_check() {
        let mut stack = [0u8; 64];
        prepare(&mut stack);
        assert!(check(stack.as_ptr() as usize, stack.len()));
    }

    #[test]
    fn corrupted_guard_fails_check() {
        let mut stack = [0u8; 64];
        prepare(&mut stack);
        stack[0] = !stack[0];
        assert!(!check(stack.as_ptr() as usize, stack.len()));
    }

    #[test]
    fn undersized_stack_is_not_checked() {
        let stack = [0u8; 2];
        assert!(check(stack.as_ptr() as usize, stack.len()));
    }
}
