//! Keeps package balances in step with confirmed bookings.
//!
//! A transition into `confirmed` takes one session from the member's active
//! package with the latest expiry; cancelling a confirmed booking gives one
//! back to whichever active package has the latest expiry at cancellation
//! time. That may differ from the package originally debited if packages were
//! assigned or expired in between.
//!
//! Missing members and empty packages are not errors: the booking stands and
//! the ledger is left alone. Every adjustment is journalled under the event
//! id, so a redelivered event changes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, info, warn};

use super::booking_event_bus::BookingEventListener;
use super::port_errors::{map_member_error, map_package_error};
use super::ports::{
    LedgerAdjustment, LedgerEntryKind, LedgerReceipt, MemberRepository, SessionNotifier,
    UserPackageRepository,
};
use super::{BookingEvent, Error, PackageId, SessionsNearEnd, UserId, select_active_package};

/// Why an event that should have moved a balance did not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerSkipReason {
    /// The booking's member no longer exists.
    MissingUser,
    /// The member has no active package assigned by the event time.
    NoActivePackage,
    /// The selected package had no session left to take.
    NoSessionsRemaining,
}

/// What applying one event did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The transition neither debits nor refunds.
    NoChange,
    /// One session was taken.
    Debited {
        /// Package debited.
        package_id: PackageId,
        /// Balance after the debit.
        remaining_sessions: u32,
    },
    /// One session was returned.
    Credited {
        /// Package credited.
        package_id: PackageId,
        /// Balance after the credit.
        remaining_sessions: u32,
    },
    /// The adjustment was skipped.
    Skipped(LedgerSkipReason),
    /// This event was already applied on an earlier delivery.
    AlreadyApplied,
}

/// Listener applying session debits and refunds.
#[derive(Clone)]
pub struct SessionLedgerReconciler<P, M, N> {
    packages: Arc<P>,
    members: Arc<M>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<P, M, N> SessionLedgerReconciler<P, M, N> {
    /// Create a reconciler over the package store, member lookup, and
    /// low-balance notifier. `clock` stamps journal entries.
    pub fn new(
        packages: Arc<P>,
        members: Arc<M>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            packages,
            members,
            notifier,
            clock,
        }
    }
}

impl<P, M, N> SessionLedgerReconciler<P, M, N>
where
    P: UserPackageRepository,
    M: MemberRepository,
    N: SessionNotifier,
{
    /// Apply the ledger effect of one booking event.
    ///
    /// # Errors
    ///
    /// Returns a domain error when the member or package store fails. A
    /// failing notifier is logged and does not fail the call.
    pub async fn apply(&self, event: &BookingEvent) -> Result<LedgerOutcome, Error> {
        let transition = event.transition();
        let kind = if transition.debits_session() {
            LedgerEntryKind::Debit
        } else if transition.refunds_session() {
            LedgerEntryKind::Credit
        } else {
            return Ok(LedgerOutcome::NoChange);
        };

        let booking = event.booking();
        let user_id = booking.user_id;
        let member_exists = self
            .members
            .exists(user_id)
            .await
            .map_err(map_member_error)?;
        if !member_exists {
            warn!(
                %user_id,
                booking_id = %booking.id,
                event_id = %event.event_id(),
                "booking references a missing member; ledger left untouched"
            );
            return Ok(LedgerOutcome::Skipped(LedgerSkipReason::MissingUser));
        }

        let packages = self
            .packages
            .list_for_user(user_id)
            .await
            .map_err(map_package_error)?;
        let Some(package) = select_active_package(&packages, user_id, event.occurred_at()) else {
            debug!(%user_id, kind = %kind, "no active package; ledger left untouched");
            return Ok(LedgerOutcome::Skipped(LedgerSkipReason::NoActivePackage));
        };
        let package_id = package.id;

        let receipt = LedgerReceipt {
            event_id: event.event_id(),
            booking_id: booking.id,
            kind,
            recorded_at: self.clock.utc(),
        };
        let adjustment = match kind {
            LedgerEntryKind::Debit => self.packages.debit_session(package_id, &receipt).await,
            LedgerEntryKind::Credit => self.packages.credit_session(package_id, &receipt).await,
        }
        .map_err(map_package_error)?;

        let outcome = match (kind, adjustment) {
            (_, LedgerAdjustment::AlreadyApplied) => {
                debug!(
                    event_id = %receipt.event_id,
                    %package_id,
                    "ledger adjustment already journalled"
                );
                LedgerOutcome::AlreadyApplied
            }
            (_, LedgerAdjustment::Exhausted) => {
                debug!(%user_id, %package_id, "package has no sessions left; booking not charged");
                LedgerOutcome::Skipped(LedgerSkipReason::NoSessionsRemaining)
            }
            (LedgerEntryKind::Debit, LedgerAdjustment::Applied { remaining_sessions }) => {
                info!(%user_id, %package_id, remaining_sessions, "session debited");
                self.signal_if_near_end(user_id, package_id, remaining_sessions)
                    .await;
                LedgerOutcome::Debited {
                    package_id,
                    remaining_sessions,
                }
            }
            (LedgerEntryKind::Credit, LedgerAdjustment::Applied { remaining_sessions }) => {
                info!(%user_id, %package_id, remaining_sessions, "session refunded");
                LedgerOutcome::Credited {
                    package_id,
                    remaining_sessions,
                }
            }
        };
        Ok(outcome)
    }

    async fn signal_if_near_end(
        &self,
        user_id: UserId,
        package_id: PackageId,
        remaining: u32,
    ) {
        let Some(signal) = SessionsNearEnd::for_balance(user_id, package_id, remaining) else {
            return;
        };
        if let Err(error) = self.notifier.notify_sessions_near_end(&signal).await {
            warn!(%user_id, %package_id, %error, "sessions-near-end signal not delivered");
        }
    }
}

#[async_trait]
impl<P, M, N> BookingEventListener for SessionLedgerReconciler<P, M, N>
where
    P: UserPackageRepository,
    M: MemberRepository,
    N: SessionNotifier,
{
    fn name(&self) -> &'static str {
        "session_ledger"
    }

    async fn handle(&self, event: &BookingEvent) -> Result<(), Error> {
        self.apply(event).await.map(drop)
    }
}

#[cfg(test)]
#[path = "session_ledger_tests.rs"]
mod tests;
