//! Booking facts consumed by the reconcilers and the signals they produce.
//!
//! Events stay transport agnostic: the queue hands them to listeners as plain
//! values, and any adapter can map outbound signals to its own payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Booking, BookingId, BookingStatus, GymClassId, PackageId, UserId};

/// Status change carried by a booking event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingTransition {
    /// Status before the change; `None` for a freshly created booking.
    pub previous: Option<BookingStatus>,
    /// Status after the change.
    pub current: BookingStatus,
}

impl BookingTransition {
    /// Whether the transition consumes a session from the member's package.
    ///
    /// Only a booking that holds no session yet pays for one: a new booking,
    /// a waitlist promotion, or a cancelled booking being reinstated.
    /// `completed` and `no_show` already consumed theirs, so an edit back to
    /// `confirmed` takes nothing.
    ///
    /// # Examples
    /// ```
    /// use gym_backend::domain::{BookingStatus, BookingTransition};
    ///
    /// let promoted = BookingTransition {
    ///     previous: Some(BookingStatus::Waitlist),
    ///     current: BookingStatus::Confirmed,
    /// };
    /// assert!(promoted.debits_session());
    /// ```
    #[must_use]
    pub fn debits_session(self) -> bool {
        self.current == BookingStatus::Confirmed
            && matches!(
                self.previous,
                None | Some(BookingStatus::Waitlist | BookingStatus::Cancelled)
            )
    }

    /// Whether the transition returns a session to the member's package.
    ///
    /// Only a cancellation of a booking that was `confirmed` refunds. A
    /// waitlisted or already-cancelled booking never consumed a session.
    #[must_use]
    pub fn refunds_session(self) -> bool {
        self.previous == Some(BookingStatus::Confirmed) && self.current == BookingStatus::Cancelled
    }
}

/// A booking was created by the reservation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreated {
    /// Unique delivery identity; redeliveries reuse it.
    pub event_id: Uuid,
    /// When the booking was made.
    pub occurred_at: DateTime<Utc>,
    /// The booking as created.
    pub booking: Booking,
}

/// A booking was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCancelled {
    /// Unique delivery identity; redeliveries reuse it.
    pub event_id: Uuid,
    /// When the cancellation happened.
    pub occurred_at: DateTime<Utc>,
    /// The booking after cancellation.
    pub booking: Booking,
    /// Status the booking held before it was cancelled.
    pub previous_status: BookingStatus,
}

/// A booking moved between non-cancelled statuses: waitlist promotion,
/// check-in, no-show marking, or an admin edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStatusChanged {
    /// Unique delivery identity; redeliveries reuse it.
    pub event_id: Uuid,
    /// When the change happened.
    pub occurred_at: DateTime<Utc>,
    /// The booking after the change.
    pub booking: Booking,
    /// Status before the change.
    pub previous_status: BookingStatus,
}

/// Booking facts emitted by the booking mutation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// See [`BookingCreated`].
    Created(BookingCreated),
    /// See [`BookingCancelled`].
    Cancelled(BookingCancelled),
    /// See [`BookingStatusChanged`].
    StatusChanged(BookingStatusChanged),
}

impl BookingEvent {
    /// Build a creation event with a fresh event id.
    #[must_use]
    pub fn created(booking: Booking, occurred_at: DateTime<Utc>) -> Self {
        Self::Created(BookingCreated {
            event_id: Uuid::new_v4(),
            occurred_at,
            booking,
        })
    }

    /// Build a cancellation event with a fresh event id.
    #[must_use]
    pub fn cancelled(
        booking: Booking,
        previous_status: BookingStatus,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::Cancelled(BookingCancelled {
            event_id: Uuid::new_v4(),
            occurred_at,
            booking,
            previous_status,
        })
    }

    /// Build a status change event with a fresh event id.
    #[must_use]
    pub fn status_changed(
        booking: Booking,
        previous_status: BookingStatus,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::StatusChanged(BookingStatusChanged {
            event_id: Uuid::new_v4(),
            occurred_at,
            booking,
            previous_status,
        })
    }

    /// Delivery identity shared by every redelivery of this event.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        match self {
            Self::Created(event) => event.event_id,
            Self::Cancelled(event) => event.event_id,
            Self::StatusChanged(event) => event.event_id,
        }
    }

    /// When the underlying booking mutation happened.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Created(event) => event.occurred_at,
            Self::Cancelled(event) => event.occurred_at,
            Self::StatusChanged(event) => event.occurred_at,
        }
    }

    /// The booking the event is about.
    #[must_use]
    pub fn booking(&self) -> &Booking {
        match self {
            Self::Created(event) => &event.booking,
            Self::Cancelled(event) => &event.booking,
            Self::StatusChanged(event) => &event.booking,
        }
    }

    /// Status change described by the event.
    ///
    /// A cancellation always ends in `cancelled`, whatever the attached
    /// booking snapshot says.
    #[must_use]
    pub fn transition(&self) -> BookingTransition {
        match self {
            Self::Created(event) => BookingTransition {
                previous: None,
                current: event.booking.status,
            },
            Self::Cancelled(event) => BookingTransition {
                previous: Some(event.previous_status),
                current: BookingStatus::Cancelled,
            },
            Self::StatusChanged(event) => BookingTransition {
                previous: Some(event.previous_status),
                current: event.booking.status,
            },
        }
    }

    /// Stable event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "booking_created",
            Self::Cancelled(_) => "booking_cancelled",
            Self::StatusChanged(_) => "booking_status_changed",
        }
    }
}

/// Signal raised when a debit leaves a package with one or two sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionsNearEnd {
    /// Package owner.
    pub user_id: UserId,
    /// Package that was debited.
    pub package_id: PackageId,
    /// Balance after the debit.
    pub remaining_sessions: u32,
    /// `true` when one session is left, `false` when two are left.
    pub is_last_session: bool,
}

impl SessionsNearEnd {
    /// Signal for a post-debit balance, if that balance warrants one.
    ///
    /// # Examples
    /// ```
    /// use gym_backend::domain::{PackageId, SessionsNearEnd, UserId};
    ///
    /// let user = UserId::new(1);
    /// let package = PackageId::new(2);
    /// assert!(SessionsNearEnd::for_balance(user, package, 1).is_some_and(|s| s.is_last_session));
    /// assert!(SessionsNearEnd::for_balance(user, package, 2).is_some_and(|s| !s.is_last_session));
    /// assert!(SessionsNearEnd::for_balance(user, package, 0).is_none());
    /// assert!(SessionsNearEnd::for_balance(user, package, 3).is_none());
    /// ```
    #[must_use]
    pub fn for_balance(user_id: UserId, package_id: PackageId, remaining: u32) -> Option<Self> {
        matches!(remaining, 1 | 2).then_some(Self {
            user_id,
            package_id,
            remaining_sessions: remaining,
            is_last_session: remaining == 1,
        })
    }
}

/// Signal produced by the external waitlist promoter when a place frees up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistSpotAvailable {
    /// Class with a free place.
    pub class_id: GymClassId,
    /// Waitlisted booking offered the place.
    pub booking_id: BookingId,
    /// Member holding that booking.
    pub user_id: UserId,
}
