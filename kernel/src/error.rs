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

//! The kernel's closed error set. Every fallible entry point returns
//! `Result<T, Error>`; there is no global errno and no silent failure path.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `thread_create`: the TCB pool is exhausted.
    TooManyThreads,
    /// `thread_create` / `irq_register`: priority out of range.
    InvalidPriority,
    /// `thread_create`: stack too small for a synthetic frame, or misaligned.
    InvalidStack,
    /// `*_try_*`: the operation would have suspended.
    WouldBlock,
    /// `*_timed_*`: the wait elapsed without the primitive being satisfied.
    Timeout,
    /// `irq_register` / `irq_unregister`: vector out of range or reserved.
    InvalidVector,
    /// `Mutex::unlock`: caller does not hold the mutex.
    NotOwner,
    /// A `ThreadId` referenced a freed or out-of-range slot.
    InvalidHandle,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::TooManyThreads => "too many threads: TCB pool exhausted",
            Error::InvalidPriority => "priority out of range",
            Error::InvalidStack => "stack too small or misaligned",
            Error::WouldBlock => "operation would block",
            Error::Timeout => "wait timed out",
            Error::InvalidVector => "IRQ vector out of range or reserved",
            Error::NotOwner => "mutex not owned by caller",
            Error::InvalidHandle => "handle refers to a freed or out-of-range slot",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_displays_without_panicking() {
        let variants = [
            Error::TooManyThreads,
            Error::InvalidPriority,
            Error::InvalidStack,
            Error::WouldBlock,
            Error::Timeout,
            Error::InvalidVector,
            Error::NotOwner,
            Error::InvalidHandle,
        ];
        for e in variants {
            let rendered = format!("{e}");
            assert!(!rendered.is_empty());
        }
    }
}
