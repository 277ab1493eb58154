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

//! Interval/delay/repeat timer state machine.
//!
//! A [`Timer`] only does the arithmetic: it reports when it triggers and when
//! its repeat budget is exhausted. Invoking callbacks and detaching exhausted
//! timers from their target is the scheduler's job.

use crate::error::SchedulerError;

/// How many times a timer repeats after its first trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repeat {
    /// The timer never exhausts its repeat budget.
    Forever,
    /// The timer triggers `n + 1` times in total.
    Times(u32),
}

/// Sentinel repeat value for timers that never stop.
pub const REPEAT_FOREVER: Repeat = Repeat::Forever;

impl Repeat {
    /// Returns `true` for [`Repeat::Forever`].
    #[inline]
    pub fn is_forever(self) -> bool {
        matches!(self, Repeat::Forever)
    }
}

impl From<u32> for Repeat {
    /// `u32::MAX` maps to [`Repeat::Forever`], any other value to [`Repeat::Times`].
    fn from(value: u32) -> Self {
        if value == u32::MAX {
            Repeat::Forever
        } else {
            Repeat::Times(value)
        }
    }
}

/// Timing parameters of a scheduled timer.
///
/// ```
/// use tempo_scheduler::{Repeat, TimerOptions};
///
/// let options = TimerOptions::new(0.5).with_repeat(Repeat::Times(3)).with_delay(1.0).paused(true);
/// assert_eq!(options.repeat, Repeat::Times(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerOptions {
    /// Seconds between triggers. Zero triggers on every update after warm-up.
    pub interval: f64,
    /// Repeat budget.
    pub repeat: Repeat,
    /// Seconds to wait before the first trigger. Zero means no delay.
    pub delay: f64,
    /// Initial paused state of the target's timers.
    pub paused: bool,
}

impl TimerOptions {
    /// A timer repeating forever every `interval` seconds, with no delay.
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            repeat: Repeat::Forever,
            delay: 0.0,
            paused: false,
        }
    }

    /// Sets the repeat budget.
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets the initial delay.
    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the initial paused state.
    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SchedulerError> {
        if !self.interval.is_finite() || self.interval < 0.0 {
            return Err(SchedulerError::InvalidInterval(self.interval));
        }
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(SchedulerError::InvalidDelay(self.delay));
        }
        Ok(())
    }
}

/// What canceling a timer does beyond stopping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// A free-standing timer. Canceling only stops it.
    Plain,
    /// A timer owned by a target's timer list. Canceling also detaches it.
    TargetBound,
}

/// Lifecycle state of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not yet updated. The first update only arms the timer.
    Idle,
    /// Accumulating elapsed time.
    Armed,
    /// Terminal. Further updates have no effect.
    Canceled,
}

/// Outcome of a single [`Timer::update`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerStep {
    /// The timer was idle and has just been armed.
    WarmedUp,
    /// Time accumulated without reaching a threshold.
    Waiting,
    /// The timer triggered.
    Fired {
        /// Elapsed time at the moment of the trigger.
        elapsed: f64,
        /// The repeat budget is exhausted and the timer must be detached from
        /// its target. Always `false` for [`TimerKind::Plain`].
        detach: bool,
    },
    /// The timer is canceled.
    Inactive,
}

/// A lightweight interval timer.
#[derive(Debug, Clone)]
pub struct Timer {
    kind: TimerKind,
    state: TimerState,
    interval: f64,
    delay: f64,
    use_delay: bool,
    repeat: Repeat,
    elapsed: f64,
    times_executed: u32,
}

impl Timer {
    /// Creates a free-standing timer.
    pub fn plain(interval: f64, repeat: Repeat, delay: f64) -> Self {
        Self::with_kind(TimerKind::Plain, interval, repeat, delay)
    }

    pub(crate) fn target_bound(options: &TimerOptions) -> Self {
        Self::with_kind(
            TimerKind::TargetBound,
            options.interval,
            options.repeat,
            options.delay,
        )
    }

    fn with_kind(kind: TimerKind, interval: f64, repeat: Repeat, delay: f64) -> Self {
        Self {
            kind,
            state: TimerState::Idle,
            interval,
            delay,
            use_delay: delay > 0.0,
            repeat,
            elapsed: 0.0,
            times_executed: 0,
        }
    }

    /// The timer's kind.
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// The timer's current state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Seconds between triggers.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Changes the interval without resetting accumulated time.
    pub fn set_interval(&mut self, interval: f64) {
        self.interval = interval;
    }

    /// Accumulated time since the last trigger, `None` while idle.
    pub fn elapsed(&self) -> Option<f64> {
        match self.state {
            TimerState::Idle => None,
            _ => Some(self.elapsed),
        }
    }

    /// Number of triggers counted against the repeat budget.
    pub fn times_executed(&self) -> u32 {
        self.times_executed
    }

    /// Moves the timer to its terminal state.
    ///
    /// Returns `true` when the caller must also detach the timer from its
    /// target.
    pub fn cancel(&mut self) -> bool {
        self.state = TimerState::Canceled;
        self.kind == TimerKind::TargetBound
    }

    /// Advances the timer by `dt` seconds.
    pub fn update(&mut self, dt: f64) -> TimerStep {
        match self.state {
            TimerState::Canceled => TimerStep::Inactive,
            TimerState::Idle => {
                self.state = TimerState::Armed;
                self.elapsed = 0.0;
                self.times_executed = 0;
                TimerStep::WarmedUp
            }
            TimerState::Armed => {
                self.elapsed += dt;
                if self.repeat.is_forever() && !self.use_delay {
                    self.advance_standard()
                } else {
                    self.advance_counted()
                }
            }
        }
    }

    fn advance_standard(&mut self) -> TimerStep {
        if self.elapsed < self.interval {
            return TimerStep::Waiting;
        }
        let elapsed = self.elapsed;
        self.elapsed = 0.0;
        TimerStep::Fired {
            elapsed,
            detach: false,
        }
    }

    fn advance_counted(&mut self) -> TimerStep {
        let elapsed = self.elapsed;
        if self.use_delay {
            if elapsed < self.delay {
                return TimerStep::Waiting;
            }
            self.elapsed -= self.delay;
            self.use_delay = false;
        } else {
            if elapsed < self.interval {
                return TimerStep::Waiting;
            }
            self.elapsed = 0.0;
        }
        self.times_executed = self.times_executed.saturating_add(1);

        let detach = match self.repeat {
            Repeat::Times(budget) if self.times_executed > budget => self.cancel(),
            _ => false,
        };
        TimerStep::Fired { elapsed, detach }
    }
}
