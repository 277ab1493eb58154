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

//! The scheduler facade and its per-frame `tick`.

use crate::callback::{CallbackKey, SchedulerFn, Updatable, UpdateCallback};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::priority::{Partition, PRIORITY_SYSTEM};
use crate::target::{TargetId, TargetStore};
use crate::timer::TimerOptions;
use crate::timer_registry::{ScheduleOutcome, TimerRegistry, TimerVisit};
use crate::update_list::PriorityUpdateList;
use crate::update_registry::{UpdateEntry, UpdateRegistry};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

/// Drives every per-frame update and timer of an application.
///
/// The external frame loop calls [`tick`](Self::tick) once per frame. Callbacks
/// receive `&mut Scheduler` and may schedule, unschedule or pause anything,
/// including themselves, while the tick is running:
///
/// - update entries removed during a tick are tombstoned and swept at its end;
/// - update entries added during a tick first run on the next tick;
/// - timers removed during a tick are unlinked immediately, with the iteration
///   cursors adjusted so that no timer is skipped or visited twice.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tempo_scheduler::{Scheduler, TimerOptions};
///
/// let mut scheduler = Scheduler::new();
/// let player = scheduler.register_target();
/// let fired = Rc::new(Cell::new(0));
///
/// let counter = fired.clone();
/// scheduler
///     .schedule("blink", player, TimerOptions::new(0.5), move |_, _| {
///         counter.set(counter.get() + 1)
///     })
///     .unwrap();
///
/// scheduler.tick(0.016); // warm-up
/// scheduler.tick(0.5);
/// assert_eq!(fired.get(), 1);
/// ```
pub struct Scheduler {
    targets: TargetStore,
    updates: UpdateRegistry,
    partitions: [PriorityUpdateList; 3],
    /// Update entries added while locked, in request order.
    pending_updates: Vec<TargetId>,
    timers: TimerRegistry,
    time_scale: f64,
    locked: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler from a configuration.
    ///
    /// An invalid time scale is reported and replaced by `1.0`.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let time_scale = match config.validate() {
            Ok(()) => config.time_scale,
            Err(e) => {
                log::error!("{e}. Falling back to a time scale of 1.0.");
                1.0
            }
        };
        log::info!(
            "Scheduler initialized (time_scale={time_scale}, update_capacity={}, timer_target_capacity={}).",
            config.update_capacity,
            config.timer_target_capacity
        );
        Self {
            targets: TargetStore::new(),
            updates: UpdateRegistry::with_capacity(config.update_capacity),
            partitions: [
                PriorityUpdateList::with_capacity(config.update_capacity / 4),
                PriorityUpdateList::with_capacity(config.update_capacity),
                PriorityUpdateList::with_capacity(config.update_capacity / 4),
            ],
            pending_updates: Vec::new(),
            timers: TimerRegistry::with_capacity(config.timer_target_capacity),
            time_scale,
            locked: false,
        }
    }

    // --- Targets ---

    /// Registers a target without a default update function.
    pub fn register_target(&mut self) -> TargetId {
        self.targets.insert(None)
    }

    /// Registers a target whose [`Updatable::update`] becomes its default
    /// per-frame update.
    ///
    /// Only a weak reference is kept: once the target is dropped its default
    /// update silently stops running.
    pub fn register_updatable<T: Updatable + 'static>(&mut self, target: &Rc<RefCell<T>>) -> TargetId {
        let weak = Rc::downgrade(target);
        let weak: Weak<RefCell<dyn Updatable>> = weak;
        self.targets.insert(Some(weak))
    }

    /// Unschedules everything for the target and frees its handle.
    ///
    /// While a tick is running the handle's slot is only recycled after the
    /// tick ends.
    pub fn release_target(&mut self, target: TargetId) -> Result<(), SchedulerError> {
        self.ensure_target(target)?;
        self.unschedule_all_for_target(target);
        self.targets.release(target);
        if !self.locked {
            self.targets.flush_quarantine();
        }
        log::debug!("Released target {target}.");
        Ok(())
    }

    /// Returns `true` if the handle designates a live target.
    pub fn contains_target(&self, target: TargetId) -> bool {
        self.targets.contains(target)
    }

    // --- Frame ---

    /// Runs one frame: every update entry by partition and priority, then
    /// every timer by target registration order.
    pub fn tick(&mut self, dt: f64) {
        if self.locked {
            log::error!("Scheduler::tick called from inside a scheduled callback; ignoring.");
            return;
        }
        self.locked = true;

        let dt = if self.time_scale != 1.0 {
            dt * self.time_scale
        } else {
            dt
        };

        for partition in Partition::ORDER {
            self.run_partition(partition, dt);
        }
        self.run_timers(dt);

        self.sweep_updates();
        self.flush_pending_updates();
        self.targets.flush_quarantine();

        self.locked = false;
        log::trace!(
            "Tick done (dt={dt}, updates={}, timer_targets={}).",
            self.updates.len(),
            self.timers.len()
        );
    }

    fn run_partition(&mut self, partition: Partition, dt: f64) {
        // Only pending additions and tombstones happen while locked, so the
        // length cannot change during the loop.
        let len = self.partitions[partition.index()].len();
        for index in 0..len {
            let Some(entry) = self.partitions[partition.index()].get(index) else {
                break;
            };
            let Some(mut callback) = self.updates.begin_invoke(entry.target) else {
                continue;
            };
            callback.invoke(self, dt);
            self.updates.end_invoke(entry.target, callback);
        }
    }

    fn run_timers(&mut self, dt: f64) {
        self.timers.begin_pass();
        while let Some(target) = self.timers.next_target() {
            let paused = self.timers.get(target).map_or(true, |entry| entry.paused);
            if !paused {
                while let Some(visit) = self.timers.visit_next_timer(target, dt) {
                    if let TimerVisit::Fired {
                        elapsed,
                        detach,
                        mut callback,
                    } = visit
                    {
                        callback(self, elapsed);
                        self.timers.finish_timer(target, callback, detach);
                    }
                }
            }
            self.timers.finish_target();
        }
    }

    fn sweep_updates(&mut self) {
        let updates = &mut self.updates;
        for list in &mut self.partitions {
            list.retain(|entry| {
                let marked = updates
                    .get(entry.target)
                    .map_or(true, |update| update.marked_for_deletion);
                if marked {
                    updates.remove(entry.target);
                }
                !marked
            });
        }
        self.pending_updates.retain(|&target| {
            let marked = updates
                .get(target)
                .map_or(true, |update| update.marked_for_deletion);
            if marked {
                updates.remove(target);
            }
            !marked
        });
    }

    fn flush_pending_updates(&mut self) {
        for target in std::mem::take(&mut self.pending_updates) {
            if let Some(entry) = self.updates.get_mut(target) {
                entry.listed = true;
                let (priority, partition) = (entry.priority, entry.partition());
                self.link_update(target, priority, partition);
            }
        }
    }

    fn link_update(&mut self, target: TargetId, priority: i32, partition: Partition) {
        let list = &mut self.partitions[partition.index()];
        if partition == Partition::Zero {
            list.push(target);
        } else {
            list.insert(target, priority);
        }
    }

    // --- Time scale ---

    /// Sets the global multiplier applied to every tick's delta time.
    pub fn set_time_scale(&mut self, time_scale: f64) {
        if !time_scale.is_finite() || time_scale < 0.0 {
            log::warn!("Ignoring invalid time scale {time_scale}.");
            return;
        }
        self.time_scale = time_scale;
    }

    /// The global multiplier applied to every tick's delta time.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Returns `true` while a tick is running.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    // --- Timers ---

    /// Schedules `callback` to run on `target` according to `options`.
    ///
    /// If a timer with the same key is already scheduled for the target, only
    /// its interval is updated and `callback` is dropped. All timers of a
    /// target share the paused state given by its first timer.
    pub fn schedule<F>(
        &mut self,
        key: impl Into<CallbackKey>,
        target: TargetId,
        options: TimerOptions,
        callback: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut(&mut Scheduler, f64) + 'static,
    {
        self.ensure_target(target)?;
        options.validate().inspect_err(|e| log::error!("{e}"))?;

        let key = key.into();
        let boxed: SchedulerFn = Box::new(callback);
        match self
            .timers
            .schedule(key.clone(), target, &options, boxed)
            .inspect_err(|e| log::error!("{e}"))?
        {
            ScheduleOutcome::Added => {
                log::debug!("Scheduled timer '{key}' on {target} ({options:?}).")
            }
            ScheduleOutcome::IntervalUpdated { previous } => log::debug!(
                "Timer '{key}' already scheduled on {target}. Updating interval from {previous:.4} to {:.4}.",
                options.interval
            ),
        }
        Ok(())
    }

    /// Schedules a timer repeating forever every `interval` seconds, with no delay.
    pub fn schedule_interval<F>(
        &mut self,
        key: impl Into<CallbackKey>,
        target: TargetId,
        interval: f64,
        paused: bool,
        callback: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut(&mut Scheduler, f64) + 'static,
    {
        self.schedule(key, target, TimerOptions::new(interval).paused(paused), callback)
    }

    /// Removes the timer registered under `key` for `target`. Missing timers
    /// are ignored.
    pub fn unschedule(&mut self, key: impl Into<CallbackKey>, target: TargetId) {
        let key = key.into();
        if self.timers.unschedule(&key, target) {
            log::debug!("Unscheduled timer '{key}' from {target}.");
        } else {
            log::trace!("No timer '{key}' on {target} to unschedule.");
        }
    }

    /// Returns `true` if a timer is registered under `key` for `target`.
    pub fn is_scheduled(&self, key: impl Into<CallbackKey>, target: TargetId) -> Result<bool, SchedulerError> {
        self.ensure_target(target)?;
        Ok(self.timers.is_scheduled(&key.into(), target))
    }

    // --- Updates ---

    /// Schedules the target's own [`Updatable::update`] to run every frame.
    ///
    /// Lower priorities run first. See
    /// [`schedule_update_with`](Self::schedule_update_with) for the rules
    /// applied to a target that already has an update entry.
    pub fn schedule_update(&mut self, target: TargetId, priority: i32, paused: bool) -> Result<(), SchedulerError> {
        self.ensure_target(target)?;
        let Some(default_update) = self.targets.default_update(target) else {
            let e = SchedulerError::MissingUpdateFn(target);
            log::error!("{e}");
            return Err(e);
        };
        self.schedule_per_frame(target, priority, paused, UpdateCallback::Target(default_update));
        Ok(())
    }

    /// Schedules `update` to run every frame for `target`.
    ///
    /// If the target already has an update entry with the same priority, only
    /// its paused state is refreshed and its pending removal canceled. With a
    /// different priority the entry is replaced, unless a tick is running: the
    /// priority change is then rejected with a warning and only the paused
    /// state is applied.
    pub fn schedule_update_with<F>(
        &mut self,
        target: TargetId,
        priority: i32,
        paused: bool,
        update: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut(&mut Scheduler, f64) + 'static,
    {
        self.ensure_target(target)?;
        self.schedule_per_frame(target, priority, paused, UpdateCallback::Closure(Box::new(update)));
        Ok(())
    }

    fn schedule_per_frame(&mut self, target: TargetId, priority: i32, paused: bool, callback: UpdateCallback) {
        if let Some(entry) = self.updates.get_mut(target) {
            if entry.priority == priority {
                entry.marked_for_deletion = false;
                entry.paused = paused;
                return;
            }
            if self.locked {
                log::warn!(
                    "Cannot change update priority of {target} from {} to {priority} during a tick.",
                    entry.priority
                );
                entry.marked_for_deletion = false;
                entry.paused = paused;
                return;
            }
            self.unschedule_update(target);
        }

        let mut entry = UpdateEntry::new(target, callback, priority, paused);
        let partition = entry.partition();
        if self.locked {
            self.pending_updates.push(target);
        } else {
            entry.listed = true;
            self.link_update(target, priority, partition);
        }
        self.updates.insert(entry);
        log::debug!("Scheduled update of {target} with priority {priority} in {partition:?} partition.");
    }

    /// Removes the target's update entry. During a tick the entry is only
    /// marked and removed once the tick ends.
    pub fn unschedule_update(&mut self, target: TargetId) {
        if self.locked {
            if let Some(entry) = self.updates.get_mut(target) {
                entry.marked_for_deletion = true;
            }
            return;
        }
        if let Some(entry) = self.updates.remove(target) {
            if entry.listed {
                self.partitions[entry.partition().index()].remove(target);
            }
            log::debug!("Unscheduled update of {target}.");
        } else {
            log::trace!("No update of {target} to unschedule.");
        }
    }

    /// Returns `true` if the target has an update entry that is not pending removal.
    pub fn is_update_scheduled(&self, target: TargetId) -> Result<bool, SchedulerError> {
        self.ensure_target(target)?;
        Ok(self
            .updates
            .get(target)
            .is_some_and(|entry| !entry.marked_for_deletion))
    }

    // --- Bulk ---

    /// Removes every timer and the update entry of `target`.
    pub fn unschedule_all_for_target(&mut self, target: TargetId) {
        if self.timers.unschedule_all(target) {
            log::debug!("Unscheduled all timers of {target}.");
        }
        self.unschedule_update(target);
    }

    /// Removes every timer of every target and every update entry with a
    /// priority of at least `min_priority`.
    ///
    /// Update entries below `min_priority` are left untouched, even on targets
    /// that also held timers.
    pub fn unschedule_all_with_min_priority(&mut self, min_priority: i32) {
        let timer_targets: Vec<TargetId> = self.timers.targets().iter().rev().copied().collect();
        for target in timer_targets {
            self.timers.unschedule_all(target);
        }

        for target in self.update_targets_with_min_priority(min_priority) {
            self.unschedule_update(target);
        }
        log::debug!("Unscheduled all callbacks with priority >= {min_priority}.");
    }

    /// Removes everything, system entries included.
    pub fn unschedule_all(&mut self) {
        self.unschedule_all_with_min_priority(PRIORITY_SYSTEM);
    }

    /// Pauses every timer-bearing target and every update entry with a
    /// priority of at least `min_priority`.
    ///
    /// Returns the affected targets, each once, for a later
    /// [`resume_targets`](Self::resume_targets).
    pub fn pause_all_targets_with_min_priority(&mut self, min_priority: i32) -> Vec<TargetId> {
        let mut seen = HashSet::new();
        let mut affected = Vec::new();

        let timer_targets = self.timers.targets().to_vec();
        for target in timer_targets {
            if let Some(entry) = self.timers.get_mut(target) {
                entry.paused = true;
            }
            if seen.insert(target) {
                affected.push(target);
            }
        }
        for target in self.update_targets_with_min_priority(min_priority) {
            self.set_paused(target, true);
            if seen.insert(target) {
                affected.push(target);
            }
        }
        log::debug!("Paused {} targets with priority >= {min_priority}.", affected.len());
        affected
    }

    /// Pauses everything, system entries included.
    pub fn pause_all_targets(&mut self) -> Vec<TargetId> {
        self.pause_all_targets_with_min_priority(PRIORITY_SYSTEM)
    }

    /// Resumes every listed target. Unknown or untracked targets are skipped.
    pub fn resume_targets(&mut self, targets: &[TargetId]) {
        for &target in targets {
            self.set_paused(target, false);
        }
    }

    fn update_targets_with_min_priority(&self, min_priority: i32) -> Vec<TargetId> {
        let mut targets = Vec::new();
        for partition in Partition::ORDER {
            let list = &self.partitions[partition.index()];
            let skip = match partition {
                Partition::Negative => min_priority >= 0,
                Partition::Zero => min_priority > 0,
                Partition::Positive => false,
            };
            if skip {
                continue;
            }
            targets.extend(
                list.iter()
                    .filter(|entry| entry.priority >= min_priority)
                    .map(|entry| entry.target),
            );
        }
        targets.extend(self.pending_updates.iter().copied().filter(|&target| {
            self.updates
                .get(target)
                .is_some_and(|entry| entry.priority >= min_priority)
        }));
        targets
    }

    // --- Pause ---

    /// Pauses the target's timers and update entry. Untracked targets are ignored.
    pub fn pause_target(&mut self, target: TargetId) -> Result<(), SchedulerError> {
        self.ensure_target(target)?;
        self.set_paused(target, true);
        Ok(())
    }

    /// Resumes the target's timers and update entry. Untracked targets are ignored.
    pub fn resume_target(&mut self, target: TargetId) -> Result<(), SchedulerError> {
        self.ensure_target(target)?;
        self.set_paused(target, false);
        Ok(())
    }

    /// Returns the paused state of the target's timers, or of its update
    /// entry if it has no timers, or `false` if it has neither.
    pub fn is_target_paused(&self, target: TargetId) -> Result<bool, SchedulerError> {
        self.ensure_target(target)?;
        if let Some(entry) = self.timers.get(target) {
            return Ok(entry.paused);
        }
        Ok(self.updates.get(target).is_some_and(|entry| entry.paused))
    }

    fn set_paused(&mut self, target: TargetId, paused: bool) {
        if let Some(entry) = self.timers.get_mut(target) {
            entry.paused = paused;
        }
        if let Some(entry) = self.updates.get_mut(target) {
            entry.paused = paused;
        }
    }

    fn ensure_target(&self, target: TargetId) -> Result<(), SchedulerError> {
        if self.targets.contains(target) {
            Ok(())
        } else {
            let e = SchedulerError::UnknownTarget(target);
            log::error!("{e}");
            Err(e)
        }
    }

    // --- Introspection ---

    /// Number of update entries in `partition`, including entries marked for
    /// deletion and excluding entries still waiting to be linked.
    pub fn partition_len(&self, partition: Partition) -> usize {
        self.partitions[partition.index()].len()
    }

    /// Number of targets currently holding timers.
    pub fn timer_target_count(&self) -> usize {
        self.timers.len()
    }

    /// Number of live targets.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_pending_update_is_linked_after_tick() {
        let mut scheduler = Scheduler::new();
        let spawner = scheduler.register_target();
        let spawned = scheduler.register_target();
        let runs = Rc::new(Cell::new(0));

        let counter = runs.clone();
        scheduler
            .schedule_update_with(spawner, 0, false, move |scheduler, _| {
                let counter = counter.clone();
                scheduler
                    .schedule_update_with(spawned, 0, false, move |_, _| counter.set(counter.get() + 1))
                    .unwrap();
            })
            .unwrap();

        scheduler.tick(0.1);
        assert_eq!(runs.get(), 0, "Entries added during a tick start on the next one");
        assert_eq!(scheduler.partition_len(Partition::Zero), 2);

        scheduler.tick(0.1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_priority_change_is_rejected_while_locked() {
        let mut scheduler = Scheduler::new();
        let target = scheduler.register_target();

        scheduler
            .schedule_update_with(target, 5, false, move |scheduler, _| {
                scheduler
                    .schedule_update_with(target, -5, true, |_, _| {})
                    .unwrap();
            })
            .unwrap();
        scheduler.tick(0.0);

        assert_eq!(scheduler.partition_len(Partition::Positive), 1);
        assert_eq!(scheduler.partition_len(Partition::Negative), 0);
        assert!(scheduler.is_target_paused(target).unwrap(), "Pause flag still applies");

        // Outside a tick the change goes through.
        scheduler
            .schedule_update_with(target, -5, false, |_, _| {})
            .unwrap();
        assert_eq!(scheduler.partition_len(Partition::Positive), 0);
        assert_eq!(scheduler.partition_len(Partition::Negative), 1);
    }

    #[test]
    fn test_reentrant_tick_is_ignored() {
        let mut scheduler = Scheduler::new();
        let target = scheduler.register_target();
        let depth = Rc::new(Cell::new(0));

        let counter = depth.clone();
        scheduler
            .schedule_update_with(target, 0, false, move |scheduler, dt| {
                counter.set(counter.get() + 1);
                assert!(scheduler.is_locked());
                scheduler.tick(dt);
            })
            .unwrap();
        scheduler.tick(0.1);

        assert_eq!(depth.get(), 1);
        assert!(!scheduler.is_locked());
    }

    #[test]
    fn test_release_during_tick_defers_slot_reuse() {
        let mut scheduler = Scheduler::new();
        let doomed = scheduler.register_target();

        scheduler
            .schedule_update_with(doomed, 0, false, move |scheduler, _| {
                scheduler.release_target(doomed).unwrap();
                let fresh = scheduler.register_target();
                assert_ne!(fresh.index, doomed.index, "Slot must stay quarantined");
            })
            .unwrap();
        scheduler.tick(0.0);

        assert!(!scheduler.contains_target(doomed));
        assert_eq!(scheduler.partition_len(Partition::Zero), 0);
        let recycled = scheduler.register_target();
        assert_eq!(recycled.index, doomed.index);
        assert_eq!(recycled.generation, doomed.generation + 1);
    }

    #[test]
    fn test_invalid_time_scale_is_ignored() {
        let mut scheduler = Scheduler::with_config(SchedulerConfig {
            time_scale: f64::NAN,
            ..SchedulerConfig::default()
        });
        assert_eq!(scheduler.time_scale(), 1.0);
        scheduler.set_time_scale(-1.0);
        assert_eq!(scheduler.time_scale(), 1.0);
        scheduler.set_time_scale(0.5);
        assert_eq!(scheduler.time_scale(), 0.5);
    }
}
