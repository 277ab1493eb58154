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

//! Priority-ordered sequence of update targets.

use crate::target::TargetId;

/// Position of a target inside a [`PriorityUpdateList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListEntry {
    pub target: TargetId,
    pub priority: i32,
}

/// One priority partition.
///
/// Entries are kept in ascending priority order; entries of equal priority keep
/// their insertion order. The list only stores ordering. Callbacks and flags
/// live in the [`UpdateRegistry`](crate::update_registry::UpdateRegistry).
#[derive(Debug, Default)]
pub(crate) struct PriorityUpdateList {
    entries: Vec<ListEntry>,
}

impl PriorityUpdateList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Splices the target before the first entry with a strictly greater
    /// priority, or appends it.
    pub fn insert(&mut self, target: TargetId, priority: i32) {
        let position = self
            .entries
            .iter()
            .position(|entry| priority < entry.priority)
            .unwrap_or(self.entries.len());
        self.entries
            .insert(position, ListEntry { target, priority });
    }

    /// Appends the target. Used for the zero partition where every entry has
    /// the same priority.
    pub fn push(&mut self, target: TargetId) {
        self.entries.push(ListEntry {
            target,
            priority: 0,
        });
    }

    /// Structurally removes the target. Must not be called while the list is
    /// being iterated.
    pub fn remove(&mut self, target: TargetId) -> bool {
        match self.entries.iter().position(|entry| entry.target == target) {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&ListEntry) -> bool) {
        self.entries.retain(|entry| keep(entry));
    }

    pub fn get(&self, index: usize) -> Option<ListEntry> {
        self.entries.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ListEntry> {
        self.entries.iter()
    }
}
