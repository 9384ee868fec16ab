//! Keeps `gym_classes.current_participants` equal to the occupying bookings.
//!
//! The count is always recomputed from the booking rows and written back,
//! never incremented, so replaying an event or reordering two events for the
//! same class converges on the same value.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::booking_event_bus::BookingEventListener;
use super::port_errors::{map_booking_error, map_gym_class_error};
use super::ports::{BookingRepository, GymClassRepository};
use super::{BookingEvent, Error, GymClassId};

/// Listener that recomputes a class's participant count.
#[derive(Clone)]
pub struct ParticipantCountReconciler<C, B> {
    classes: Arc<C>,
    bookings: Arc<B>,
}

impl<C, B> ParticipantCountReconciler<C, B> {
    /// Create a reconciler over the class and booking repositories.
    pub fn new(classes: Arc<C>, bookings: Arc<B>) -> Self {
        Self { classes, bookings }
    }
}

impl<C, B> ParticipantCountReconciler<C, B>
where
    C: GymClassRepository,
    B: BookingRepository,
{
    /// Recompute and persist the participant count of `class_id`.
    ///
    /// Returns the written count, or `None` when the class no longer exists.
    ///
    /// # Errors
    ///
    /// Returns a domain error when either repository fails.
    pub async fn reconcile_class(&self, class_id: GymClassId) -> Result<Option<u32>, Error> {
        let class = self
            .classes
            .find_by_id(class_id)
            .await
            .map_err(map_gym_class_error)?;
        let Some(class) = class else {
            warn!(%class_id, "class missing; participant count left untouched");
            return Ok(None);
        };

        let count = self
            .bookings
            .count_occupying(class_id)
            .await
            .map_err(map_booking_error)?;
        self.classes
            .set_current_participants(class_id, count)
            .await
            .map_err(map_gym_class_error)?;

        debug!(
            %class_id,
            previous = class.current_participants,
            current = count,
            "participant count reconciled"
        );
        Ok(Some(count))
    }
}

#[async_trait]
impl<C, B> BookingEventListener for ParticipantCountReconciler<C, B>
where
    C: GymClassRepository,
    B: BookingRepository,
{
    fn name(&self) -> &'static str {
        "participant_count"
    }

    async fn handle(&self, event: &BookingEvent) -> Result<(), Error> {
        self.reconcile_class(event.booking().class_id).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ports::{
        BookingRepositoryError, GymClassRepositoryError, MockBookingRepository,
        MockGymClassRepository,
    };
    use crate::domain::{
        Booking, BookingId, BookingStatus, ErrorCode, GymClass, GymClassStatus, UserId,
    };

    const CLASS: GymClassId = GymClassId::new(7);

    fn class(current: u32) -> GymClass {
        GymClass {
            id: CLASS,
            name: "Spin".to_owned(),
            max_participants: 12,
            current_participants: current,
            status: GymClassStatus::Scheduled,
            starts_at: Utc
                .with_ymd_and_hms(2026, 4, 1, 18, 0, 0)
                .single()
                .expect("valid timestamp"),
        }
    }

    #[fixture]
    fn cancelled_event() -> BookingEvent {
        let at = Utc
            .with_ymd_and_hms(2026, 3, 30, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        BookingEvent::cancelled(
            Booking {
                id: BookingId::new(1),
                user_id: UserId::new(2),
                class_id: CLASS,
                status: BookingStatus::Cancelled,
                attended: None,
                created_at: at,
            },
            BookingStatus::Confirmed,
            at,
        )
    }

    #[rstest]
    #[tokio::test]
    async fn writes_recomputed_count(cancelled_event: BookingEvent) {
        let mut classes = MockGymClassRepository::new();
        classes
            .expect_find_by_id()
            .with(eq(CLASS))
            .return_once(|_| Ok(Some(class(5))));
        classes
            .expect_set_current_participants()
            .with(eq(CLASS), eq(3_u32))
            .times(1)
            .return_once(|_, _| Ok(()));
        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_count_occupying()
            .with(eq(CLASS))
            .return_once(|_| Ok(3));

        let reconciler = ParticipantCountReconciler::new(Arc::new(classes), Arc::new(bookings));
        reconciler
            .handle(&cancelled_event)
            .await
            .expect("reconcile succeeds");
    }

    #[rstest]
    #[tokio::test]
    async fn writes_even_when_count_already_matches() {
        let mut classes = MockGymClassRepository::new();
        classes
            .expect_find_by_id()
            .return_once(|_| Ok(Some(class(4))));
        classes
            .expect_set_current_participants()
            .with(eq(CLASS), eq(4_u32))
            .times(1)
            .return_once(|_, _| Ok(()));
        let mut bookings = MockBookingRepository::new();
        bookings.expect_count_occupying().return_once(|_| Ok(4));

        let reconciler = ParticipantCountReconciler::new(Arc::new(classes), Arc::new(bookings));
        let written = reconciler.reconcile_class(CLASS).await.expect("reconciled");
        assert_eq!(written, Some(4));
    }

    #[rstest]
    #[tokio::test]
    async fn missing_class_is_a_no_op(cancelled_event: BookingEvent) {
        let mut classes = MockGymClassRepository::new();
        classes.expect_find_by_id().return_once(|_| Ok(None));
        classes.expect_set_current_participants().never();
        let mut bookings = MockBookingRepository::new();
        bookings.expect_count_occupying().never();

        let reconciler = ParticipantCountReconciler::new(Arc::new(classes), Arc::new(bookings));
        reconciler
            .handle(&cancelled_event)
            .await
            .expect("missing class is not an error");
    }

    #[rstest]
    #[case(
        Err(GymClassRepositoryError::connection("refused")),
        ErrorCode::ServiceUnavailable
    )]
    #[case(Err(GymClassRepositoryError::query("bad column")), ErrorCode::InternalError)]
    #[tokio::test]
    async fn class_lookup_failures_surface(
        #[case] lookup: Result<Option<GymClass>, GymClassRepositoryError>,
        #[case] expected: ErrorCode,
    ) {
        let mut classes = MockGymClassRepository::new();
        classes.expect_find_by_id().return_once(move |_| lookup);
        let bookings = MockBookingRepository::new();

        let reconciler = ParticipantCountReconciler::new(Arc::new(classes), Arc::new(bookings));
        let error = reconciler
            .reconcile_class(CLASS)
            .await
            .expect_err("lookup fails");
        assert_eq!(error.code(), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn count_failure_leaves_class_untouched() {
        let mut classes = MockGymClassRepository::new();
        classes
            .expect_find_by_id()
            .return_once(|_| Ok(Some(class(2))));
        classes.expect_set_current_participants().never();
        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_count_occupying()
            .return_once(|_| Err(BookingRepositoryError::connection("timeout")));

        let reconciler = ParticipantCountReconciler::new(Arc::new(classes), Arc::new(bookings));
        let error = reconciler
            .reconcile_class(CLASS)
            .await
            .expect_err("count fails");
        assert!(error.code().is_transient());
    }
}
