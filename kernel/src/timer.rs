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

//! The periodic tick: a thin wrapper around the scheduler's timeout list,
//! driven by whichever platform timer the board wires up to fire at
//! [`crate::config::TICK_HZ`].

use crate::error::Result;
use crate::irq::{self, IrqHandler};
use crate::scheduler;

/// Re-exported so callers don't need to reach into `scheduler` directly
/// for the one counter a board's idle/diagnostics code typically wants.
pub use scheduler::tick_now;

/// Registers `on_tick` as the handler for the board's periodic timer
/// vector. The board's own startup code is responsible for programming
/// the timer hardware to actually fire at `TICK_HZ` and for unmasking
/// `vector` in the interrupt controller; this only wires the kernel side.
pub fn install(vector: usize, priority: u8) -> Result<()> {
    irq::irq_register(vector, on_tick as IrqHandler, priority)
}

fn on_tick() {
    scheduler::on_tick();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_rejects_out_of_range_vector() {
        assert_eq!(install(crate::config::MAX_IRQS, 0), Err(crate::error::Error::InvalidVector));
    }
}
