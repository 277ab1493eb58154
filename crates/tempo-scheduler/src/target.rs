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

//! Target handles and the arena that hands them out.

use crate::callback::Updatable;
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

/// An opaque handle identifying a schedulable target.
///
/// It combines a slot index with a generation count. When a target is released
/// its index can be recycled for a new target, but the generation is
/// incremented, so a stale `TargetId` never matches the new occupant.
///
/// Handles are process-local: they are not meant to survive serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    /// The index of the target's slot in the arena.
    pub index: u32,
    /// A generation counter that is incremented each time the index is recycled.
    pub generation: u32,
}

impl TargetId {
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct TargetSlot {
    id: TargetId,
    alive: bool,
    /// Weak so that the scheduler never extends the lifetime of a target.
    default_update: Option<Weak<RefCell<dyn Updatable>>>,
}

/// Slot arena for target handles.
///
/// Maintains a dense list of slots and recycles released indices through a
/// free list. Released indices first go through a quarantine list so that the
/// owner can decide when recycling becomes safe.
#[derive(Default)]
pub(crate) struct TargetStore {
    slots: Vec<TargetSlot>,
    free: Vec<u32>,
    quarantine: Vec<u32>,
    live: usize,
}

impl TargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new or recycled `TargetId`.
    ///
    /// If a free index is available its generation is incremented, otherwise a
    /// new slot is appended.
    pub fn insert(&mut self, default_update: Option<Weak<RefCell<dyn Updatable>>>) -> TargetId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.id.generation = slot.id.generation.wrapping_add(1);
            slot.alive = true;
            slot.default_update = default_update;
            slot.id
        } else {
            let id = TargetId {
                index: self.slots.len() as u32,
                generation: 0,
            };
            self.slots.push(TargetSlot {
                id,
                alive: true,
                default_update,
            });
            id
        }
    }

    /// Returns `true` if `id` designates a live target of this arena.
    pub fn contains(&self, id: TargetId) -> bool {
        self.slots
            .get(id.slot())
            .is_some_and(|slot| slot.alive && slot.id == id)
    }

    /// Kills the slot and quarantines its index. Returns `false` for stale handles.
    pub fn release(&mut self, id: TargetId) -> bool {
        match self.slots.get_mut(id.slot()) {
            Some(slot) if slot.alive && slot.id == id => {
                slot.alive = false;
                slot.default_update = None;
                self.quarantine.push(id.index);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Makes every quarantined index available for reuse.
    pub fn flush_quarantine(&mut self) {
        self.free.append(&mut self.quarantine);
    }

    /// Returns the target's default update function, if it was registered with one.
    pub fn default_update(&self, id: TargetId) -> Option<Weak<RefCell<dyn Updatable>>> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.alive && slot.id == id)
            .and_then(|slot| slot.default_update.clone())
    }

    /// Number of live targets.
    pub fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_assigns_sequential_indices() {
        let mut store = TargetStore::new();
        let a = store.insert(None);
        let b = store.insert(None);

        assert_eq!(a, TargetId { index: 0, generation: 0 });
        assert_eq!(b, TargetId { index: 1, generation: 0 });
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_released_index_is_recycled_only_after_flush() {
        let mut store = TargetStore::new();
        let a = store.insert(None);
        assert!(store.release(a));
        assert!(!store.contains(a), "Released handle must be invalid");

        let b = store.insert(None);
        assert_eq!(b.index, 1, "Quarantined index must not be reused yet");

        store.flush_quarantine();
        let c = store.insert(None);
        assert_eq!(c.index, 0);
        assert_eq!(c.generation, 1, "Recycled slot must bump its generation");
        assert!(!store.contains(a), "Stale handle must not match the new occupant");
        assert!(store.contains(c));
    }

    #[test]
    fn test_release_twice_is_rejected() {
        let mut store = TargetStore::new();
        let a = store.insert(None);
        assert!(store.release(a));
        assert!(!store.release(a));
        assert_eq!(store.len(), 0, "A rejected release must not change the count");
    }

    #[test]
    fn test_len_tracks_live_targets_through_recycling() {
        let mut store = TargetStore::new();
        let a = store.insert(None);
        let b = store.insert(None);
        store.insert(None);
        assert_eq!(store.len(), 3);

        store.release(a);
        store.release(b);
        assert_eq!(store.len(), 1, "Quarantined targets are not live");

        store.flush_quarantine();
        store.insert(None);
        assert_eq!(store.len(), 2);
    }
}
