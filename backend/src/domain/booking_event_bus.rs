//! Explicit subscriptions for booking events.
//!
//! Listeners are registered once at startup with their dependencies already
//! injected. Dispatch runs every listener even when an earlier one fails, so
//! one broken store cannot starve the others.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{BookingEvent, Error};

/// A subscriber to booking events.
///
/// Implementations must be idempotent: the worker redelivers an event when
/// any listener fails, so every listener may see the same event id twice.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingEventListener: Send + Sync {
    /// Stable listener name for logs and failure reports.
    fn name(&self) -> &'static str;

    /// React to one booking event.
    async fn handle(&self, event: &BookingEvent) -> Result<(), Error>;
}

/// One listener's failure during dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFailure {
    /// Failing listener.
    pub listener: &'static str,
    /// Error it returned.
    pub error: Error,
}

/// Dispatch finished with at least one failing listener.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} booking event listener(s) failed", .failures.len())]
pub struct DispatchError {
    /// Every failure, in subscription order.
    pub failures: Vec<ListenerFailure>,
}

impl DispatchError {
    /// Whether any failure may clear on redelivery.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.error.code().is_transient())
    }
}

/// Fan-out of booking events to registered listeners.
#[derive(Clone, Default)]
pub struct BookingEventBus {
    listeners: Vec<Arc<dyn BookingEventListener>>,
}

impl BookingEventBus {
    /// Create a bus with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; listeners run in registration order.
    #[must_use]
    pub fn subscribe(mut self, listener: Arc<dyn BookingEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Names of the registered listeners.
    #[must_use]
    pub fn listener_names(&self) -> Vec<&'static str> {
        self.listeners.iter().map(|listener| listener.name()).collect()
    }

    /// Deliver `event` to every listener.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] listing each listener that failed.
    pub async fn dispatch(&self, event: &BookingEvent) -> Result<(), DispatchError> {
        let mut failures = Vec::new();
        for listener in &self.listeners {
            match listener.handle(event).await {
                Ok(()) => debug!(
                    listener = listener.name(),
                    event = event.name(),
                    event_id = %event.event_id(),
                    "booking event handled"
                ),
                Err(error) => {
                    warn!(
                        listener = listener.name(),
                        event = event.name(),
                        event_id = %event.event_id(),
                        code = ?error.code(),
                        %error,
                        "booking event listener failed"
                    );
                    failures.push(ListenerFailure {
                        listener: listener.name(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::{Booking, BookingId, BookingStatus, GymClassId, UserId};

    #[fixture]
    fn event() -> BookingEvent {
        let created_at = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        BookingEvent::created(
            Booking {
                id: BookingId::new(1),
                user_id: UserId::new(2),
                class_id: GymClassId::new(3),
                status: BookingStatus::Confirmed,
                attended: None,
                created_at,
            },
            created_at,
        )
    }

    fn listener(name: &'static str, result: Result<(), Error>) -> Arc<dyn BookingEventListener> {
        let mut mock = MockBookingEventListener::new();
        mock.expect_name().return_const(name);
        mock.expect_handle()
            .times(1)
            .return_once(move |_| result);
        Arc::new(mock)
    }

    #[rstest]
    #[tokio::test]
    async fn dispatch_reaches_every_listener(event: BookingEvent) {
        let bus = BookingEventBus::new()
            .subscribe(listener("first", Ok(())))
            .subscribe(listener("second", Ok(())));

        bus.dispatch(&event).await.expect("dispatch succeeds");
        assert_eq!(bus.listener_names(), vec!["first", "second"]);
    }

    #[rstest]
    #[tokio::test]
    async fn failing_listener_does_not_block_the_next(event: BookingEvent) {
        let bus = BookingEventBus::new()
            .subscribe(listener(
                "participants",
                Err(Error::service_unavailable("pool exhausted")),
            ))
            .subscribe(listener("ledger", Ok(())));

        let error = bus.dispatch(&event).await.expect_err("dispatch fails");

        assert_eq!(error.failures.len(), 1);
        assert_eq!(
            error.failures.first().map(|failure| failure.listener),
            Some("participants")
        );
        assert!(error.is_transient());
    }

    #[rstest]
    #[tokio::test]
    async fn empty_bus_accepts_events(event: BookingEvent) {
        BookingEventBus::new()
            .dispatch(&event)
            .await
            .expect("nothing to fail");
    }
}
