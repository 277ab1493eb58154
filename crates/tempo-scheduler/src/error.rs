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

//! Error types for the scheduler and its configuration.

use crate::target::TargetId;
use thiserror::Error;

/// A violated precondition at a scheduler call site.
///
/// These signal programming errors. Missing state on unschedule or resume is
/// not an error and never produces one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// The handle was never issued by this scheduler, or has been released.
    #[error("target {0} is not registered with this scheduler")]
    UnknownTarget(TargetId),
    /// A target's timers share a single paused state, fixed by its first timer.
    #[error(
        "target {target} timers were scheduled with paused={existing}, \
         cannot add a timer with paused={requested}"
    )]
    PausedStateMismatch {
        /// The target being scheduled.
        target: TargetId,
        /// The paused state currently recorded for the target.
        existing: bool,
        /// The paused state requested by the call.
        requested: bool,
    },
    /// Timer intervals must be finite and non-negative.
    #[error("invalid timer interval: {0}")]
    InvalidInterval(f64),
    /// Timer delays must be finite and non-negative.
    #[error("invalid timer delay: {0}")]
    InvalidDelay(f64),
    /// `schedule_update` was called without a function for a target registered
    /// without a default update.
    #[error("target {0} has no default update function")]
    MissingUpdateFn(TargetId),
}

/// An error raised while loading or storing a [`SchedulerConfig`](crate::SchedulerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access config file '{path}': {source}")]
    Io {
        /// The path of the file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The RON source could not be parsed.
    #[error("failed to parse scheduler config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The configuration could not be serialized to RON.
    #[error("failed to serialize scheduler config: {0}")]
    Serialize(#[from] ron::Error),
    /// Time scale must be finite and non-negative.
    #[error("invalid time scale: {0}")]
    InvalidTimeScale(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_target() {
        let target = TargetId {
            index: 3,
            generation: 1,
        };
        let err = SchedulerError::UnknownTarget(target);
        assert_eq!(err.to_string(), "target #3v1 is not registered with this scheduler");

        let err = SchedulerError::PausedStateMismatch {
            target,
            existing: true,
            requested: false,
        };
        assert!(err.to_string().contains("paused=true"));
    }
}
