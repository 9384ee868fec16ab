//! Port for member packages and their session ledger.
//!
//! Debits and credits are single atomic adjustments journalled under the
//! triggering event id, so a redelivered booking event cannot move a balance
//! twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::text_enum::define_text_enum;
use crate::domain::{BookingId, NewUserPackage, PackageExtension, PackageId, UserId, UserPackage};

use super::define_port_error;

define_port_error! {
    /// Errors raised by user package repository adapters.
    pub enum UserPackageRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "user package repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "user package repository query failed: {message}",
        /// The package row vanished between selection and update.
        PackageNotFound { package_id: PackageId } =>
            "user package {package_id} not found",
    }
}

define_text_enum! {
    /// Direction of a session ledger adjustment.
    pub enum LedgerEntryKind {
        /// One session consumed.
        Debit => "debit",
        /// One session returned.
        Credit => "credit",
    }
}

/// Journal key and context for one ledger adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    /// Event that triggered the adjustment.
    pub event_id: Uuid,
    /// Booking the adjustment settles.
    pub booking_id: BookingId,
    /// Direction.
    pub kind: LedgerEntryKind,
    /// Journal timestamp.
    pub recorded_at: DateTime<Utc>,
}

/// Result of applying one ledger adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAdjustment {
    /// The balance moved; carries the new balance.
    Applied {
        /// Balance after the adjustment.
        remaining_sessions: u32,
    },
    /// A debit found no session left to take.
    Exhausted,
    /// The receipt was already journalled; nothing changed.
    AlreadyApplied,
}

/// Port for package reads, assignment, and balance adjustments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserPackageRepository: Send + Sync {
    /// Load a member's packages ordered by id.
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPackage>, UserPackageRepositoryError>;

    /// Load every `active` package ordered by id.
    async fn list_active(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError>;

    /// Load every package ordered by id.
    async fn list_all(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError>;

    /// Insert a new package with `remaining_sessions = total_sessions` and
    /// status `active`.
    async fn insert(
        &self,
        package: &NewUserPackage,
    ) -> Result<UserPackage, UserPackageRepositoryError>;

    /// Take one session if any remain.
    async fn debit_session(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError>;

    /// Return one session, uncapped by `total_sessions`.
    async fn credit_session(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError>;

    /// Overwrite a package balance.
    async fn set_remaining_sessions(
        &self,
        package_id: PackageId,
        remaining: u32,
    ) -> Result<(), UserPackageRepositoryError>;

    /// Add `extension` to the package's stored expiry, total, and balance
    /// in one locked update and return the package as written.
    ///
    /// The balance is extended relative to its value at write time; a debit
    /// or credit applied since the package was listed is kept.
    async fn apply_extension(
        &self,
        package_id: PackageId,
        extension: PackageExtension,
    ) -> Result<UserPackage, UserPackageRepositoryError>;
}
