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

//! Callback types invoked by the scheduler and the keys that identify them.

use crate::scheduler::Scheduler;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

/// A boxed callback receiving the scheduler and a time value.
///
/// For update entries the value is the scaled frame delta, for timers it is the
/// timer's elapsed time at the moment it triggered.
pub(crate) type SchedulerFn = Box<dyn FnMut(&mut Scheduler, f64)>;

/// A target that knows how to update itself every frame.
///
/// Registering a target through
/// [`Scheduler::register_updatable`](crate::Scheduler::register_updatable) lets
/// [`Scheduler::schedule_update`](crate::Scheduler::schedule_update) fall back
/// to this implementation when no explicit update function is given.
pub trait Updatable {
    /// Advances the target by `dt` seconds of scaled time.
    fn update(&mut self, scheduler: &mut Scheduler, dt: f64);
}

/// Identifies a timer callback within a target.
///
/// Rust closures have no identity, so every scheduled timer carries a key.
/// Rescheduling with the same key updates the existing timer instead of
/// adding a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    /// A human-readable name.
    Named(Cow<'static, str>),
    /// A numeric identifier.
    Id(u64),
}

impl From<&'static str> for CallbackKey {
    fn from(name: &'static str) -> Self {
        Self::Named(Cow::Borrowed(name))
    }
}

impl From<String> for CallbackKey {
    fn from(name: String) -> Self {
        Self::Named(Cow::Owned(name))
    }
}

impl From<u64> for CallbackKey {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Id(id) => write!(f, "#{id}"),
        }
    }
}

/// The function an update entry runs every frame.
pub(crate) enum UpdateCallback {
    /// An explicit closure.
    Closure(SchedulerFn),
    /// The target's own [`Updatable::update`], held weakly.
    Target(Weak<RefCell<dyn Updatable>>),
}

impl UpdateCallback {
    pub(crate) fn invoke(&mut self, scheduler: &mut Scheduler, dt: f64) {
        match self {
            Self::Closure(callback) => callback(scheduler, dt),
            Self::Target(target) => match target.upgrade() {
                Some(target) => target.borrow_mut().update(scheduler, dt),
                None => log::trace!("Skipping update of a dropped target."),
            },
        }
    }
}

impl fmt::Debug for UpdateCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure(_) => f.write_str("UpdateCallback::Closure"),
            Self::Target(_) => f.write_str("UpdateCallback::Target"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_conversions() {
        assert_eq!(CallbackKey::from("spin"), CallbackKey::Named(Cow::Borrowed("spin")));
        assert_eq!(CallbackKey::from("spin".to_string()), CallbackKey::from("spin"));
        assert_eq!(CallbackKey::from(7u64), CallbackKey::Id(7));
        assert_ne!(CallbackKey::from(7u64), CallbackKey::from("7"));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CallbackKey::from("blink").to_string(), "blink");
        assert_eq!(CallbackKey::from(42u64).to_string(), "#42");
    }

    struct Ticker {
        total: f64,
    }

    impl Updatable for Ticker {
        fn update(&mut self, _scheduler: &mut Scheduler, dt: f64) {
            self.total += dt;
        }
    }

    #[test]
    fn test_update_callback_dispatch() {
        let mut scheduler = Scheduler::new();
        let ticker = std::rc::Rc::new(RefCell::new(Ticker { total: 0.0 }));
        let weak = std::rc::Rc::downgrade(&ticker);
        let weak: Weak<RefCell<dyn Updatable>> = weak;

        let mut callback = UpdateCallback::Target(weak);
        callback.invoke(&mut scheduler, 0.25);
        callback.invoke(&mut scheduler, 0.5);
        assert_eq!(ticker.borrow().total, 0.75);

        drop(ticker);
        callback.invoke(&mut scheduler, 1.0); // dropped target is skipped

        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = calls.clone();
        let mut closure = UpdateCallback::Closure(Box::new(move |_, _| counter.set(counter.get() + 1)));
        closure.invoke(&mut scheduler, 0.0);
        assert_eq!(calls.get(), 1);
    }
}
