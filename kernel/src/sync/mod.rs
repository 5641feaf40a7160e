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

//! Blocking IPC primitives: a priority-ordered mutex and a mailbox that
//! doubles as a synchronous rendezvous at zero capacity. Neither does
//! priority inheritance -- a low-priority mutex owner still runs at its
//! own priority even while higher-priority threads queue behind it.

pub mod mailbox;
pub mod mutex;

pub use mailbox::Mailbox;
pub use mutex::Mutex;
