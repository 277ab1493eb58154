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

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction-time settings for a [`Scheduler`](crate::Scheduler).
///
/// Stored as RON, e.g.
///
/// ```text
/// (
///     time_scale: 0.5,
///     update_capacity: 128,
/// )
/// ```
///
/// Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Global multiplier applied to every tick's delta time.
    pub time_scale: f64,
    /// Number of update entries to preallocate room for.
    pub update_capacity: usize,
    /// Number of timer-bearing targets to preallocate room for.
    pub timer_target_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            update_capacity: 64,
            timer_target_capacity: 32,
        }
    }
}

impl SchedulerConfig {
    /// Parses a configuration from a RON string and validates it.
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a RON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron(&content)
    }

    /// Serializes the configuration to pretty-printed RON.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Saves the configuration to a RON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_ron()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Rejects negative or non-finite time scales.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::InvalidTimeScale(self.time_scale));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.time_scale, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SchedulerConfig::from_ron("(time_scale: 0.25)").expect("Valid RON");
        assert_eq!(config.time_scale, 0.25);
        assert_eq!(
            config.update_capacity,
            SchedulerConfig::default().update_capacity
        );
    }

    #[test]
    fn test_negative_time_scale_is_rejected() {
        let result = SchedulerConfig::from_ron("(time_scale: -2.0)");
        assert!(matches!(result, Err(ConfigError::InvalidTimeScale(scale)) if scale == -2.0));
    }

    #[test]
    fn test_malformed_ron_is_a_parse_error() {
        let result = SchedulerConfig::from_ron("(time_scale: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().expect("Temp dir should be created");
        let path = dir.path().join("scheduler.ron");
        let config = SchedulerConfig {
            time_scale: 2.0,
            update_capacity: 8,
            timer_target_capacity: 4,
        };

        config.to_file(&path).expect("Config should be written");
        let loaded = SchedulerConfig::from_file(&path).expect("Config should be read back");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SchedulerConfig::from_file("/definitely/not/here.ron").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.ron"));
    }
}
