// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Tempo Scheduler
//!
//! A single-threaded, frame-driven scheduler for per-frame updates and timers.
//!
//! Targets are registered as [`TargetId`] handles. Each target can own one
//! per-frame update entry, ordered by priority, and any number of keyed
//! [`Timer`]s. [`Scheduler::tick`] runs every update entry first, lowest
//! priority first, then every timer, and tolerates callbacks that reshape the
//! schedule while it runs.

#![warn(missing_docs)]

mod callback;
mod config;
mod error;
mod priority;
mod scheduler;
mod target;
mod timer;
mod timer_registry;
mod update_list;
mod update_registry;

pub use callback::{CallbackKey, Updatable};
pub use config::SchedulerConfig;
pub use error::{ConfigError, SchedulerError};
pub use priority::{Partition, PRIORITY_NON_SYSTEM, PRIORITY_SYSTEM};
pub use scheduler::Scheduler;
pub use target::TargetId;
pub use timer::{Repeat, Timer, TimerKind, TimerOptions, TimerState, TimerStep, REPEAT_FOREVER};
