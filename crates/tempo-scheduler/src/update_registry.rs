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

//! Handle-indexed storage of per-target update entries.

use crate::callback::UpdateCallback;
use crate::priority::Partition;
use crate::target::TargetId;

/// The per-frame update scheduled for one target.
#[derive(Debug)]
pub(crate) struct UpdateEntry {
    pub target: TargetId,
    /// `None` only while the callback is running.
    pub callback: Option<UpdateCallback>,
    pub priority: i32,
    pub paused: bool,
    pub marked_for_deletion: bool,
    /// `false` while the entry waits to be spliced into its partition.
    pub listed: bool,
}

impl UpdateEntry {
    pub fn new(target: TargetId, callback: UpdateCallback, priority: i32, paused: bool) -> Self {
        Self {
            target,
            callback: Some(callback),
            priority,
            paused,
            marked_for_deletion: false,
            listed: false,
        }
    }

    #[inline]
    pub fn partition(&self) -> Partition {
        Partition::of(self.priority)
    }

    /// Whether the entry should run on this tick.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        !self.paused && !self.marked_for_deletion
    }
}

/// O(1) index from a target handle to its update entry.
///
/// Slots are addressed by [`TargetId::index`] and checked against the full
/// handle, so an entry never answers for a recycled handle.
#[derive(Debug, Default)]
pub(crate) struct UpdateRegistry {
    slots: Vec<Option<UpdateEntry>>,
    len: usize,
}

impl UpdateRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    pub fn get(&self, target: TargetId) -> Option<&UpdateEntry> {
        self.slots
            .get(target.slot())
            .and_then(Option::as_ref)
            .filter(|entry| entry.target == target)
    }

    pub fn get_mut(&mut self, target: TargetId) -> Option<&mut UpdateEntry> {
        self.slots
            .get_mut(target.slot())
            .and_then(Option::as_mut)
            .filter(|entry| entry.target == target)
    }

    /// Stores the entry, replacing whatever occupied its slot.
    pub fn insert(&mut self, entry: UpdateEntry) {
        let slot = entry.target.slot();
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }
        if self.slots[slot].replace(entry).is_none() {
            self.len += 1;
        }
    }

    pub fn remove(&mut self, target: TargetId) -> Option<UpdateEntry> {
        let slot = self.slots.get_mut(target.slot())?;
        if slot.as_ref().is_some_and(|entry| entry.target == target) {
            self.len -= 1;
            slot.take()
        } else {
            None
        }
    }

    /// Takes the callback out of a runnable entry so it can be invoked with the
    /// scheduler borrowed mutably.
    pub fn begin_invoke(&mut self, target: TargetId) -> Option<UpdateCallback> {
        self.get_mut(target)
            .filter(|entry| entry.is_runnable())
            .and_then(|entry| entry.callback.take())
    }

    /// Puts a callback back after it ran.
    ///
    /// The entry cannot have been removed in between: while the scheduler is
    /// locked removal only marks it.
    pub fn end_invoke(&mut self, target: TargetId, callback: UpdateCallback) {
        match self.get_mut(target) {
            Some(entry) => entry.callback = Some(callback),
            None => log::error!("Update entry for target {target} vanished during its callback."),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
