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

//! A [`log`](https://docs.rs/log) backend stamping every record with the
//! tick count and calling thread, the way a kernel log line needs to read
//! to be any use debugging a scheduling problem. This crate assumes
//! nothing about *where* the bytes go -- no UART, no semihosting -- a
//! board installs a sink with [`set_sink`] during startup; until then,
//! records are silently dropped.

use core::fmt::Arguments;
use core::sync::atomic::{AtomicPtr, Ordering};

use log::{LevelFilter, Metadata, Record};

use crate::irq::IrqLock;
use crate::scheduler;

/// Where formatted log lines go. A board's startup code points this at its
/// UART, semihosting channel, or whatever else implements "write some
/// bytes out". Swappable at runtime mainly so tests can intercept it.
pub type Sink = fn(Arguments);

static SINK: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());
static SERIALIZE: IrqLock<()> = IrqLock::new(());

/// Installs the formatting sink. Call once during board startup, before
/// `log::set_logger`-driven output is expected to go anywhere.
pub fn set_sink(sink: Sink) {
    SINK.store(sink as *mut (), Ordering::Release);
}

fn sink() -> Option<Sink> {
    let ptr = SINK.load(Ordering::Acquire);
    if ptr.is_null() {
        None
    } else {
        // SAFETY: only ever stored from `set_sink` as a valid `Sink`.
        Some(unsafe { core::mem::transmute::<*mut (), Sink>(ptr) })
    }
}

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

/// Installs the kernel's logger as the `log` crate's global logger and
/// sets the initial level filter. Call once, early in board startup.
pub fn init(level: LevelFilter) {
    log::set_max_level(level);
    // A second `init` is a harmless no-op: `set_logger` only errors if a
    // *different* logger is already installed, which never happens here.
    let _ = log::set_logger(&LOGGER);
}

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(write) = sink() else { return };
        let _guard = SERIALIZE.lock();
        let ticks = scheduler::tick_now();
        let thread = scheduler::thread_current();
        write(format_args!(
            "[T:{ticks:09} TH:{thread:?}][{}] {}\n",
            record.level(),
            record.args(),
        ));
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_sink(_args: Arguments) {
        CALLS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn log_without_a_sink_does_not_panic() {
        log::logger().flush();
    }

    #[test]
    fn installed_sink_is_retrievable() {
        set_sink(counting_sink);
        assert!(sink().is_some());
    }
}
