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

//! Update priorities and the partitions they map to.

/// Lowest possible priority, reserved for engine subsystems that must run
/// before all user code.
pub const PRIORITY_SYSTEM: i32 = i32::MIN;

/// Floor for user-schedulable priorities.
pub const PRIORITY_NON_SYSTEM: i32 = PRIORITY_SYSTEM + 1;

/// One of the three groups of update entries, executed in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Priorities below zero.
    Negative = 0,
    /// Priority exactly zero, the common case.
    Zero = 1,
    /// Priorities above zero.
    Positive = 2,
}

impl Partition {
    /// All partitions in execution order.
    pub const ORDER: [Partition; 3] = [Partition::Negative, Partition::Zero, Partition::Positive];

    /// The partition an entry with `priority` belongs to.
    #[inline]
    pub fn of(priority: i32) -> Self {
        match priority.signum() {
            -1 => Partition::Negative,
            0 => Partition::Zero,
            _ => Partition::Positive,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_of_priority() {
        assert_eq!(Partition::of(PRIORITY_SYSTEM), Partition::Negative);
        assert_eq!(Partition::of(-1), Partition::Negative);
        assert_eq!(Partition::of(0), Partition::Zero);
        assert_eq!(Partition::of(1), Partition::Positive);
        assert_eq!(Partition::of(i32::MAX), Partition::Positive);
    }

    #[test]
    fn test_reserved_priorities() {
        assert!(PRIORITY_SYSTEM < PRIORITY_NON_SYSTEM);
        assert_eq!(PRIORITY_NON_SYSTEM, i32::MIN + 1);
    }
}
