//! Class bookings and their status lifecycle.
//!
//! A booking occupies a slot in its class unless it is `cancelled` or
//! `waitlist`. `completed` and `no_show` still count: the member held the
//! place even if they did not turn up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum::define_text_enum;
use super::{BookingId, GymClassId, UserId};

define_text_enum! {
    /// Booking status as stored in `bookings.status`.
    pub enum BookingStatus {
        /// The member holds a place in the class.
        Confirmed => "confirmed",
        /// The booking was withdrawn.
        Cancelled => "cancelled",
        /// The member is queued for a place.
        Waitlist => "waitlist",
        /// The class took place with the member checked in.
        Completed => "completed",
        /// The class took place without the member.
        NoShow => "no_show",
    }
}

impl BookingStatus {
    /// Statuses that do not hold a place in the class.
    pub const NON_OCCUPYING: [Self; 2] = [Self::Cancelled, Self::Waitlist];

    /// Whether a booking in this status counts towards class participants.
    ///
    /// # Examples
    /// ```
    /// use gym_backend::domain::BookingStatus;
    ///
    /// assert!(BookingStatus::NoShow.occupies_slot());
    /// assert!(!BookingStatus::Waitlist.occupies_slot());
    /// ```
    #[must_use]
    pub const fn occupies_slot(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Waitlist)
    }
}

/// Reservation of one member into one class occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Primary key.
    pub id: BookingId,
    /// Member who made the booking. The user row may have been deleted since.
    pub user_id: UserId,
    /// Booked class. The class row may have been deleted since.
    pub class_id: GymClassId,
    /// Current status.
    pub status: BookingStatus,
    /// Check-in outcome; `None` until attendance is recorded.
    pub attended: Option<bool>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Whether this booking counts towards its class participants.
    #[must_use]
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BookingStatus::Confirmed, true)]
    #[case(BookingStatus::Completed, true)]
    #[case(BookingStatus::NoShow, true)]
    #[case(BookingStatus::Cancelled, false)]
    #[case(BookingStatus::Waitlist, false)]
    fn occupancy_excludes_cancelled_and_waitlist(
        #[case] status: BookingStatus,
        #[case] occupies: bool,
    ) {
        assert_eq!(status.occupies_slot(), occupies);
        assert_eq!(
            !BookingStatus::NON_OCCUPYING.contains(&status),
            occupies,
            "NON_OCCUPYING must mirror occupies_slot"
        );
    }

    #[rstest]
    fn no_show_round_trips_through_storage_text() {
        assert_eq!(BookingStatus::NoShow.as_str(), "no_show");
        assert_eq!(
            BookingStatus::from_str("no_show"),
            Ok(BookingStatus::NoShow)
        );
    }
}
