//! In-process queue and worker delivering booking events to the bus.
//!
//! Delivery is at-least-once: when any listener fails, the whole event is
//! redelivered after an exponential backoff, up to
//! [`WorkerConfig::max_delivery_attempts`]. Listeners that already succeeded
//! see the event again and must treat it as a no-op.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::booking_event_bus::{BookingEventBus, DispatchError};
use super::BookingEvent;

/// Redelivery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Dispatch attempts per event, including the first.
    pub max_delivery_attempts: u32,
    /// Delay before the first redelivery.
    pub initial_backoff: Duration,
    /// Cap on the redelivery delay.
    pub max_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl WorkerConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use gym_backend::domain::WorkerConfig;
    ///
    /// let config = WorkerConfig::default();
    /// assert_eq!(config.backoff_after(1), Duration::from_millis(100));
    /// assert_eq!(config.backoff_after(2), Duration::from_millis(200));
    /// assert_eq!(config.backoff_after(10), Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }
}

/// Async sleep used between redeliveries.
#[async_trait]
pub trait DeliverySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl DeliverySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// The worker has stopped and no longer accepts events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("booking event queue is closed")]
pub struct QueueClosedError;

/// Publishing half of the booking event queue.
#[derive(Debug, Clone)]
pub struct BookingEventQueue {
    sender: mpsc::Sender<BookingEvent>,
}

/// Receiving half, consumed by [`BookingEventWorker::run`].
#[derive(Debug)]
pub struct BookingEventReceiver {
    receiver: mpsc::Receiver<BookingEvent>,
}

impl BookingEventQueue {
    /// Create a bounded queue. Publishers wait while `capacity` events are
    /// pending.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, BookingEventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, BookingEventReceiver { receiver })
    }

    /// Enqueue an event for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosedError`] once the worker has gone away.
    pub async fn publish(&self, event: BookingEvent) -> Result<(), QueueClosedError> {
        let event_id = event.event_id();
        self.sender.send(event).await.map_err(|_| QueueClosedError)?;
        debug!(%event_id, "booking event queued");
        Ok(())
    }
}

/// Outcome of delivering one event.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Every listener succeeded.
    Delivered {
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Attempts ran out with listeners still failing.
    Abandoned {
        /// Attempts used.
        attempts: u32,
        /// Failures from the last attempt.
        last_error: DispatchError,
    },
}

/// Totals for a worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Events every listener handled.
    pub delivered: usize,
    /// Of those, events that needed more than one attempt.
    pub redelivered: usize,
    /// Events given up on.
    pub abandoned: usize,
}

impl WorkerSummary {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { attempts } => {
                self.delivered += 1;
                if *attempts > 1 {
                    self.redelivered += 1;
                }
            }
            DeliveryOutcome::Abandoned { .. } => self.abandoned += 1,
        }
    }
}

/// Drains the queue into the bus, one event at a time.
pub struct BookingEventWorker {
    bus: BookingEventBus,
    config: WorkerConfig,
    sleeper: Arc<dyn DeliverySleeper>,
}

impl BookingEventWorker {
    /// Create a worker that sleeps on the tokio timer between attempts.
    #[must_use]
    pub fn new(bus: BookingEventBus, config: WorkerConfig) -> Self {
        Self {
            bus,
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn DeliverySleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Deliver one event, redelivering on failure.
    pub async fn deliver(&self, event: &BookingEvent) -> DeliveryOutcome {
        let max_attempts = self.config.max_delivery_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.bus.dispatch(event).await {
                Ok(()) => return DeliveryOutcome::Delivered { attempts: attempt },
                Err(last_error) if attempt >= max_attempts => {
                    error!(
                        event_id = %event.event_id(),
                        event = event.name(),
                        attempts = attempt,
                        failures = last_error.failures.len(),
                        "booking event abandoned"
                    );
                    return DeliveryOutcome::Abandoned {
                        attempts: attempt,
                        last_error,
                    };
                }
                Err(failure) => {
                    let delay = self.config.backoff_after(attempt);
                    warn!(
                        event_id = %event.event_id(),
                        event = event.name(),
                        attempt,
                        transient = failure.is_transient(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "redelivering booking event"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Deliver events until every [`BookingEventQueue`] handle is dropped.
    pub async fn run(self, mut inbox: BookingEventReceiver) -> WorkerSummary {
        let mut summary = WorkerSummary::default();
        while let Some(event) = inbox.receiver.recv().await {
            let outcome = self.deliver(&event).await;
            summary.record(&outcome);
        }
        info!(
            delivered = summary.delivered,
            redelivered = summary.redelivered,
            abandoned = summary.abandoned,
            "booking event worker stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::booking_event_bus::BookingEventListener;
    use crate::domain::{Booking, BookingId, BookingStatus, Error, GymClassId, UserId};
    use crate::test_support::RecordingSleeper;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyListener {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyListener {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BookingEventListener for FlakyListener {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn handle(&self, _event: &BookingEvent) -> Result<(), Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(Error::service_unavailable("database restarting"))
            } else {
                Ok(())
            }
        }
    }

    #[fixture]
    fn event() -> BookingEvent {
        let at = Utc
            .with_ymd_and_hms(2026, 2, 2, 8, 0, 0)
            .single()
            .expect("valid timestamp");
        BookingEvent::created(
            Booking {
                id: BookingId::new(1),
                user_id: UserId::new(1),
                class_id: GymClassId::new(1),
                status: BookingStatus::Confirmed,
                attended: None,
                created_at: at,
            },
            at,
        )
    }

    fn worker(listener: Arc<FlakyListener>, sleeper: Arc<RecordingSleeper>) -> BookingEventWorker {
        BookingEventWorker::new(
            BookingEventBus::new().subscribe(listener),
            WorkerConfig::default(),
        )
        .with_sleeper(sleeper)
    }

    #[rstest]
    #[tokio::test]
    async fn transient_failure_is_redelivered_with_backoff(event: BookingEvent) {
        let listener = FlakyListener::failing(2);
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = worker(Arc::clone(&listener), Arc::clone(&sleeper))
            .deliver(&event)
            .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
        assert_eq!(listener.calls(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn persistent_failure_is_abandoned(event: BookingEvent) {
        let listener = FlakyListener::failing(u32::MAX);
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = worker(Arc::clone(&listener), sleeper).deliver(&event).await;

        assert!(matches!(
            outcome,
            DeliveryOutcome::Abandoned { attempts: 3, .. }
        ));
        assert_eq!(listener.calls(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn run_drains_queue_until_closed(event: BookingEvent) {
        let listener = FlakyListener::failing(1);
        let sleeper = Arc::new(RecordingSleeper::default());
        let (queue, inbox) = BookingEventQueue::bounded(4);

        queue.publish(event.clone()).await.expect("queue open");
        queue.publish(event).await.expect("queue open");
        drop(queue);

        let summary = worker(listener, sleeper).run(inbox).await;
        assert_eq!(
            summary,
            WorkerSummary {
                delivered: 2,
                redelivered: 1,
                abandoned: 0,
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn publishing_after_worker_exit_fails(event: BookingEvent) {
        let (queue, inbox) = BookingEventQueue::bounded(1);
        drop(inbox);
        assert_eq!(queue.publish(event).await, Err(QueueClosedError));
    }

    #[rstest]
    #[case(1, 100)]
    #[case(3, 400)]
    #[case(6, 2_000)]
    fn backoff_doubles_up_to_cap(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(
            WorkerConfig::default().backoff_after(attempt),
            Duration::from_millis(expected_ms)
        );
    }
}
