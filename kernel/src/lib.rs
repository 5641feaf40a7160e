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

//! Fixed-priority preemptive scheduler, thread lifecycle, mutex/mailbox
//! IPC and IRQ dispatch for a small embedded kernel.
//!
//! Built `no_std`, except under `cfg(test)`: host unit tests build for the
//! host triple and want the ordinary standard library (`format!`,
//! `std::vec::Vec` in test bodies, ...), while the real target build stays
//! bare-metal. [`kestrel_arch::host_stub`] stands in for a CPU port on the
//! host so the crate still has a concrete [`kestrel_arch::Arch`] to build
//! against there.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod irq;
pub mod logger;
pub mod scheduler;
pub mod stack;
pub mod sync;
pub mod timer;

pub use error::{Error, Result};
pub use scheduler::{Msg, ThreadId};

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    log::error!("panic: {info}");
    loop {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}
