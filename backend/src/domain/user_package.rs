//! Purchased session allotments ("packages") held by members.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum::define_text_enum;
use super::{PackageId, UserId};

define_text_enum! {
    /// Package lifecycle status.
    pub enum PackageStatus {
        /// Sessions can be drawn from the package.
        Active => "active",
        /// Temporarily suspended by the member.
        Paused => "paused",
        /// Past its expiry date.
        Expired => "expired",
        /// Suspended by staff.
        Frozen => "frozen",
    }
}

define_text_enum! {
    /// What kind of product the package is.
    pub enum PackageKind {
        /// Time-bound membership; at most one may be active per member.
        Membership => "membership",
        /// Plain bundle of sessions.
        SessionPack => "session_pack",
    }
}

/// A member's purchased allotment of sessions.
///
/// ## Invariants
/// - `remaining_sessions` never goes negative (enforced by the unsigned type
///   and by saturating ledger updates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPackage {
    /// Primary key.
    pub id: PackageId,
    /// Owning member.
    pub user_id: UserId,
    /// Product kind.
    pub kind: PackageKind,
    /// Sessions granted at purchase (plus any bulk extensions).
    pub total_sessions: u32,
    /// Sessions left to book.
    pub remaining_sessions: u32,
    /// Lifecycle status.
    pub status: PackageStatus,
    /// Last day the package may be used.
    pub expiry_date: NaiveDate,
    /// Assignment timestamp; bookings before it never draw from this package.
    pub created_at: DateTime<Utc>,
}

impl UserPackage {
    /// Whether the package is in the `active` status.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PackageStatus::Active
    }

    /// Whether this is an active membership.
    #[must_use]
    pub fn is_active_membership(&self) -> bool {
        self.is_active() && self.kind == PackageKind::Membership
    }
}

/// Insert payload for a freshly assigned package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserPackage {
    /// Owning member.
    pub user_id: UserId,
    /// Product kind.
    pub kind: PackageKind,
    /// Sessions granted; also the starting balance.
    pub total_sessions: u32,
    /// Last day the package may be used.
    pub expiry_date: NaiveDate,
    /// Assignment timestamp.
    pub created_at: DateTime<Utc>,
}
