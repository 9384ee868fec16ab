//! Scheduled gym classes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GymClassId;
use super::text_enum::define_text_enum;

define_text_enum! {
    /// Lifecycle status of a class occurrence.
    pub enum GymClassStatus {
        /// Open for bookings.
        Scheduled => "scheduled",
        /// Called off by staff.
        Cancelled => "cancelled",
        /// Already held.
        Completed => "completed",
    }
}

/// A scheduled class occurrence.
///
/// `current_participants` is a cache. Only the participant reconciler and the
/// consistency auditor write it, always from a fresh count of bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GymClass {
    /// Primary key.
    pub id: GymClassId,
    /// Display name, e.g. "Morning Spin".
    pub name: String,
    /// Capacity.
    pub max_participants: u32,
    /// Cached count of slot-occupying bookings.
    pub current_participants: u32,
    /// Lifecycle status.
    pub status: GymClassStatus,
    /// Scheduled start.
    pub starts_at: DateTime<Utc>,
}

impl GymClass {
    /// Places left according to the cached participant count.
    #[must_use]
    pub fn available_spots(&self) -> u32 {
        self.max_participants
            .saturating_sub(self.current_participants)
    }

    /// Whether the cached participant count has reached capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.available_spots() == 0
    }
}
