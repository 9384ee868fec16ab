//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and behind the `test-support` feature.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::ports::{SessionNotifier, SessionNotifierError};
use crate::domain::{DeliverySleeper, SessionsNearEnd};

mod in_memory_store;

pub use in_memory_store::{InMemoryGymStore, StoreFault};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{what} mutex poisoned"),
    }
}

/// Clock pinned to an instant that tests can move forward.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    /// Clock reading `now` until advanced.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        *lock(&self.0, "clock") += delta;
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0, "clock")
    }
}

/// Sleeper that returns immediately and remembers each requested delay.
#[derive(Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Delays requested so far.
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.0, "sleeper").clone()
    }
}

#[async_trait]
impl DeliverySleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.0, "sleeper").push(duration);
    }
}

/// Notifier that keeps every signal it receives.
#[derive(Default)]
pub struct RecordingSessionNotifier(Mutex<Vec<SessionsNearEnd>>);

impl RecordingSessionNotifier {
    /// Signals received so far.
    pub fn signals(&self) -> Vec<SessionsNearEnd> {
        lock(&self.0, "notifier").clone()
    }
}

#[async_trait]
impl SessionNotifier for RecordingSessionNotifier {
    async fn notify_sessions_near_end(
        &self,
        signal: &SessionsNearEnd,
    ) -> Result<(), SessionNotifierError> {
        lock(&self.0, "notifier").push(signal.clone());
        Ok(())
    }
}
