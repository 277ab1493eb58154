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

//! Per-target timer lists with removal that is safe during iteration.
//!
//! Both the list of targets and each target's list of timers are walked with
//! a "next" cursor. Removing an element that sits before the cursor shifts the
//! cursor back by one, so the element that moved into the freed position is
//! still visited. Removing the element being visited marks it *salvaged*
//! instead of leaving a dangling reference to it. A target whose last timer
//! is removed while it is being visited stays in place until its visit ends.

use crate::callback::{CallbackKey, SchedulerFn};
use crate::error::SchedulerError;
use crate::target::TargetId;
use crate::timer::{Timer, TimerOptions, TimerStep};

/// A timer together with the callback it triggers.
pub(crate) struct ScheduledTimer {
    pub key: CallbackKey,
    pub timer: Timer,
    /// `None` only while the callback is running.
    pub callback: Option<SchedulerFn>,
}

/// All timers of one target.
pub(crate) struct TimerTargetEntry {
    pub target: TargetId,
    pub timers: Vec<ScheduledTimer>,
    pub paused: bool,
    /// Index of the next timer to visit.
    next_timer: usize,
    /// Index of the timer whose callback is running.
    current_timer: Option<usize>,
    current_timer_salvaged: bool,
}

impl TimerTargetEntry {
    fn new(target: TargetId, paused: bool) -> Self {
        Self {
            target,
            timers: Vec::new(),
            paused,
            next_timer: 0,
            current_timer: None,
            current_timer_salvaged: false,
        }
    }

    fn position(&self, key: &CallbackKey) -> Option<usize> {
        self.timers.iter().position(|scheduled| &scheduled.key == key)
    }

    fn remove_timer_at(&mut self, index: usize) {
        match self.current_timer {
            Some(current) if current == index => {
                self.current_timer = None;
                self.current_timer_salvaged = true;
            }
            Some(current) if current > index => self.current_timer = Some(current - 1),
            _ => {}
        }
        if index < self.next_timer {
            self.next_timer -= 1;
        }
        self.timers.remove(index);
    }

    fn clear(&mut self) {
        if self.current_timer.take().is_some() {
            self.current_timer_salvaged = true;
        }
        self.next_timer = 0;
        self.timers.clear();
    }
}

/// What the scheduler must do after visiting a timer.
pub(crate) enum TimerVisit {
    /// Nothing to invoke.
    Quiet,
    /// The timer triggered; its callback was taken out of the registry.
    Fired {
        elapsed: f64,
        detach: bool,
        callback: SchedulerFn,
    },
}

/// Result of a `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ScheduleOutcome {
    Added,
    IntervalUpdated { previous: f64 },
}

/// Maps each target to its ordered timer list, in target registration order.
#[derive(Default)]
pub(crate) struct TimerRegistry {
    /// Addressed by target slot index.
    entries: Vec<Option<TimerTargetEntry>>,
    /// Targets in registration order.
    order: Vec<TargetId>,
    next_target: usize,
    current_target: Option<TargetId>,
    current_target_salvaged: bool,
}

impl TimerRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn get(&self, target: TargetId) -> Option<&TimerTargetEntry> {
        self.entries
            .get(target.slot())
            .and_then(Option::as_ref)
            .filter(|entry| entry.target == target)
    }

    pub fn get_mut(&mut self, target: TargetId) -> Option<&mut TimerTargetEntry> {
        self.entries
            .get_mut(target.slot())
            .and_then(Option::as_mut)
            .filter(|entry| entry.target == target)
    }

    /// Targets holding timers, in registration order.
    pub fn targets(&self) -> &[TargetId] {
        &self.order
    }

    /// Number of timer-bearing targets, including salvaged ones awaiting removal.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Adds a timer, or updates the interval of the timer already registered
    /// under `key`.
    pub fn schedule(
        &mut self,
        key: CallbackKey,
        target: TargetId,
        options: &TimerOptions,
        callback: SchedulerFn,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        if self.get(target).is_none() {
            let slot = target.slot();
            if let Some(stale) = self.entries.get(slot).and_then(Option::as_ref) {
                let stale = stale.target;
                log::warn!("Dropping timers of stale target {stale} reusing slot {slot}.");
                self.remove_entry(stale);
            }
            if slot >= self.entries.len() {
                self.entries.resize_with(slot + 1, || None);
            }
            self.entries[slot] = Some(TimerTargetEntry::new(target, options.paused));
            self.order.push(target);
        }

        let entry = self
            .get_mut(target)
            .ok_or(SchedulerError::UnknownTarget(target))?;
        if entry.paused != options.paused {
            return Err(SchedulerError::PausedStateMismatch {
                target,
                existing: entry.paused,
                requested: options.paused,
            });
        }

        if let Some(index) = entry.position(&key) {
            let timer = &mut entry.timers[index].timer;
            let previous = timer.interval();
            timer.set_interval(options.interval);
            return Ok(ScheduleOutcome::IntervalUpdated { previous });
        }

        entry.timers.push(ScheduledTimer {
            key,
            timer: Timer::target_bound(options),
            callback: Some(callback),
        });
        Ok(ScheduleOutcome::Added)
    }

    /// Removes the timer registered under `key`. Returns `false` if there is none.
    pub fn unschedule(&mut self, key: &CallbackKey, target: TargetId) -> bool {
        let Some(entry) = self.get_mut(target) else {
            return false;
        };
        let Some(index) = entry.position(key) else {
            return false;
        };
        entry.remove_timer_at(index);
        if entry.timers.is_empty() {
            self.release_entry(target);
        }
        true
    }

    /// Removes every timer of the target. Returns `false` if it had none.
    pub fn unschedule_all(&mut self, target: TargetId) -> bool {
        let Some(entry) = self.get_mut(target) else {
            return false;
        };
        entry.clear();
        self.release_entry(target);
        true
    }

    pub fn is_scheduled(&self, key: &CallbackKey, target: TargetId) -> bool {
        self.get(target)
            .is_some_and(|entry| entry.position(key).is_some())
    }

    /// Drops the target's entry, or defers it while the target is being visited.
    fn release_entry(&mut self, target: TargetId) {
        if self.current_target == Some(target) {
            self.current_target_salvaged = true;
        } else {
            self.remove_entry(target);
        }
    }

    fn remove_entry(&mut self, target: TargetId) {
        if let Some(position) = self.order.iter().position(|&id| id == target) {
            self.order.remove(position);
            if position < self.next_target {
                self.next_target -= 1;
            }
        }
        if let Some(slot) = self.entries.get_mut(target.slot()) {
            *slot = None;
        }
    }

    /// Starts a pass over all targets.
    pub fn begin_pass(&mut self) {
        self.next_target = 0;
        self.current_target = None;
        self.current_target_salvaged = false;
    }

    /// Moves to the next target in registration order and resets its timer cursor.
    pub fn next_target(&mut self) -> Option<TargetId> {
        let target = *self.order.get(self.next_target)?;
        self.next_target += 1;
        self.current_target = Some(target);
        self.current_target_salvaged = false;
        if let Some(entry) = self.get_mut(target) {
            entry.next_timer = 0;
            entry.current_timer = None;
            entry.current_timer_salvaged = false;
        }
        Some(target)
    }

    /// Ends the visit of the current target, performing a deferred removal if
    /// it was salvaged and no timer was added since.
    pub fn finish_target(&mut self) {
        let Some(target) = self.current_target.take() else {
            return;
        };
        let salvaged = std::mem::take(&mut self.current_target_salvaged);
        if salvaged && self.get(target).is_some_and(|entry| entry.timers.is_empty()) {
            self.remove_entry(target);
        }
    }

    /// Advances the next timer of `target` by `dt`.
    ///
    /// Returns `None` once every timer of the target has been visited.
    pub fn visit_next_timer(&mut self, target: TargetId, dt: f64) -> Option<TimerVisit> {
        let entry = self.get_mut(target)?;
        let index = entry.next_timer;
        let scheduled = entry.timers.get_mut(index)?;
        entry.next_timer += 1;

        match scheduled.timer.update(dt) {
            TimerStep::Fired { elapsed, detach } => match scheduled.callback.take() {
                Some(callback) => {
                    entry.current_timer = Some(index);
                    entry.current_timer_salvaged = false;
                    Some(TimerVisit::Fired {
                        elapsed,
                        detach,
                        callback,
                    })
                }
                None => Some(TimerVisit::Quiet),
            },
            _ => Some(TimerVisit::Quiet),
        }
    }

    /// Returns the callback of the timer that just fired and detaches the timer
    /// if its repeat budget is exhausted.
    ///
    /// If the timer was removed while its callback ran, the callback is dropped.
    pub fn finish_timer(&mut self, target: TargetId, callback: SchedulerFn, detach: bool) {
        let Some(entry) = self.get_mut(target) else {
            return;
        };
        let salvaged = std::mem::take(&mut entry.current_timer_salvaged);
        let Some(index) = entry.current_timer.take() else {
            return;
        };
        if salvaged {
            return;
        }
        entry.timers[index].callback = Some(callback);
        if detach {
            entry.remove_timer_at(index);
            if entry.timers.is_empty() {
                self.release_entry(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Repeat;

    fn target(index: u32) -> TargetId {
        TargetId {
            index,
            generation: 0,
        }
    }

    fn noop() -> SchedulerFn {
        Box::new(|_, _| {})
    }

    fn schedule(registry: &mut TimerRegistry, key: &'static str, target: TargetId) {
        registry
            .schedule(key.into(), target, &TimerOptions::new(0.0), noop())
            .expect("Schedule should succeed");
    }

    fn keys(registry: &TimerRegistry, target: TargetId) -> Vec<String> {
        registry
            .get(target)
            .map(|entry| entry.timers.iter().map(|t| t.key.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_reschedule_updates_interval_only() {
        let mut registry = TimerRegistry::default();
        let t = target(0);
        registry
            .schedule("a".into(), t, &TimerOptions::new(1.0), noop())
            .unwrap();
        let outcome = registry
            .schedule("a".into(), t, &TimerOptions::new(2.5), noop())
            .unwrap();

        assert_eq!(outcome, ScheduleOutcome::IntervalUpdated { previous: 1.0 });
        let entry = registry.get(t).unwrap();
        assert_eq!(entry.timers.len(), 1);
        assert_eq!(entry.timers[0].timer.interval(), 2.5);
    }

    #[test]
    fn test_paused_state_is_fixed_by_first_schedule() {
        let mut registry = TimerRegistry::default();
        let t = target(0);
        registry
            .schedule("a".into(), t, &TimerOptions::new(1.0).paused(true), noop())
            .unwrap();
        let err = registry
            .schedule("b".into(), t, &TimerOptions::new(1.0), noop())
            .unwrap_err();

        assert_eq!(
            err,
            SchedulerError::PausedStateMismatch {
                target: t,
                existing: true,
                requested: false
            }
        );
        assert_eq!(keys(&registry, t), vec!["a"]);
    }

    #[test]
    fn test_unschedule_last_timer_removes_target() {
        let mut registry = TimerRegistry::default();
        let (a, b) = (target(0), target(1));
        schedule(&mut registry, "x", a);
        schedule(&mut registry, "y", b);

        assert!(!registry.unschedule(&"missing".into(), a));
        assert!(registry.unschedule(&"x".into(), a));
        assert!(registry.get(a).is_none());
        assert_eq!(registry.targets(), &[b]);
    }

    #[test]
    fn test_removing_visited_timer_keeps_next_one() {
        let mut registry = TimerRegistry::default();
        let t = target(0);
        for key in ["a", "b", "c"] {
            schedule(&mut registry, key, t);
        }

        registry.begin_pass();
        assert_eq!(registry.next_target(), Some(t));
        // Warm-up visit of "a", then remove it as if from its own callback.
        assert!(matches!(registry.visit_next_timer(t, 0.0), Some(TimerVisit::Quiet)));
        assert!(registry.unschedule(&"a".into(), t));

        // "b" moved into index 0; the cursor must step back onto it.
        assert!(matches!(registry.visit_next_timer(t, 0.0), Some(TimerVisit::Quiet)));
        assert!(matches!(registry.visit_next_timer(t, 0.0), Some(TimerVisit::Quiet)));
        assert!(registry.visit_next_timer(t, 0.0).is_none());
        registry.finish_target();

        let entry = registry.get(t).unwrap();
        assert!(entry
            .timers
            .iter()
            .all(|scheduled| scheduled.timer.elapsed().is_some()));
    }

    #[test]
    fn test_salvaged_current_timer_drops_callback() {
        let mut registry = TimerRegistry::default();
        let t = target(0);
        schedule(&mut registry, "a", t);
        schedule(&mut registry, "b", t);

        registry.begin_pass();
        registry.next_target();
        registry.visit_next_timer(t, 0.0);
        registry.visit_next_timer(t, 0.0);
        registry.finish_target();

        registry.begin_pass();
        registry.next_target();
        let Some(TimerVisit::Fired { callback, detach, .. }) = registry.visit_next_timer(t, 0.0)
        else {
            panic!("Zero-interval timer should fire after warm-up");
        };
        assert!(registry.unschedule(&"a".into(), t));
        registry.finish_timer(t, callback, detach);

        assert_eq!(keys(&registry, t), vec!["b"]);
        assert!(registry.get(t).unwrap().timers[0].callback.is_some());
        assert!(matches!(
            registry.visit_next_timer(t, 0.0),
            Some(TimerVisit::Fired { .. })
        ));
    }

    #[test]
    fn test_current_target_removal_is_deferred() {
        let mut registry = TimerRegistry::default();
        let (a, b) = (target(0), target(1));
        schedule(&mut registry, "x", a);
        schedule(&mut registry, "y", b);

        registry.begin_pass();
        assert_eq!(registry.next_target(), Some(a));
        assert!(registry.unschedule_all(a));
        assert!(registry.get(a).is_some(), "Visited target must stay until its visit ends");
        registry.finish_target();
        assert!(registry.get(a).is_none());

        assert_eq!(registry.next_target(), Some(b), "Next target must not be skipped");
        registry.finish_target();
        assert_eq!(registry.next_target(), None);
    }

    #[test]
    fn test_salvaged_target_survives_if_rescheduled() {
        let mut registry = TimerRegistry::default();
        let a = target(0);
        schedule(&mut registry, "x", a);

        registry.begin_pass();
        registry.next_target();
        registry.unschedule(&"x".into(), a);
        schedule(&mut registry, "z", a);
        registry.finish_target();

        assert_eq!(keys(&registry, a), vec!["z"]);
    }

    #[test]
    fn test_removing_earlier_target_does_not_skip() {
        let mut registry = TimerRegistry::default();
        let (a, b, c) = (target(0), target(1), target(2));
        for t in [a, b, c] {
            schedule(&mut registry, "x", t);
        }

        registry.begin_pass();
        registry.next_target();
        registry.finish_target();
        assert_eq!(registry.next_target(), Some(b));
        registry.unschedule_all(a);
        registry.finish_target();
        assert_eq!(registry.next_target(), Some(c));
    }

    #[test]
    fn test_exhausted_timer_is_detached() {
        let mut registry = TimerRegistry::default();
        let t = target(0);
        registry
            .schedule(
                "once".into(),
                t,
                &TimerOptions::new(0.0).with_repeat(Repeat::Times(0)),
                noop(),
            )
            .unwrap();

        registry.begin_pass();
        registry.next_target();
        registry.visit_next_timer(t, 0.0);
        registry.finish_target();

        registry.begin_pass();
        registry.next_target();
        let Some(TimerVisit::Fired { callback, detach, .. }) = registry.visit_next_timer(t, 0.0)
        else {
            panic!("Timer should fire once");
        };
        assert!(detach);
        registry.finish_timer(t, callback, detach);
        assert!(registry.get(t).is_some(), "Removal deferred while visiting");
        registry.finish_target();
        assert_eq!(registry.len(), 0);
    }
}
