//! Port for the authoritative booking rows.
//!
//! Counts are computed by the adapter so the reconcilers never load whole
//! classes worth of bookings just to count them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BookingId, BookingStatus, GymClassId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by booking repository adapters.
    pub enum BookingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "booking repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "booking repository query failed: {message}",
    }
}

/// Which side of an orphaned booking is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReference {
    /// The member row was deleted.
    User,
    /// The class row was deleted.
    Class,
    /// Both rows were deleted.
    UserAndClass,
}

impl MissingReference {
    /// Classify from the two existence checks; `None` when nothing is missing.
    #[must_use]
    pub const fn from_presence(user_exists: bool, class_exists: bool) -> Option<Self> {
        match (user_exists, class_exists) {
            (true, true) => None,
            (false, true) => Some(Self::User),
            (true, false) => Some(Self::Class),
            (false, false) => Some(Self::UserAndClass),
        }
    }
}

/// A live booking that references a deleted member or class.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrphanedBooking {
    /// Booking primary key.
    pub booking_id: BookingId,
    /// Referenced member.
    pub user_id: UserId,
    /// Referenced class.
    pub class_id: GymClassId,
    /// Status at detection time; never `cancelled`.
    pub status: BookingStatus,
    /// When the booking was made.
    pub created_at: DateTime<Utc>,
    /// What is missing.
    pub missing: MissingReference,
}

/// Port for booking counts and orphan clean-up.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Count bookings of a class whose status occupies a slot.
    async fn count_occupying(&self, class_id: GymClassId) -> Result<u32, BookingRepositoryError>;

    /// Count `confirmed` bookings a member created at or after `since`.
    async fn count_confirmed_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, BookingRepositoryError>;

    /// List non-cancelled bookings whose member or class no longer exists,
    /// ordered by booking id.
    async fn list_orphaned(&self) -> Result<Vec<OrphanedBooking>, BookingRepositoryError>;

    /// Move the given bookings to `cancelled`, skipping any already
    /// cancelled. Returns the number of rows changed.
    async fn cancel_bookings(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<usize, BookingRepositoryError>;
}
