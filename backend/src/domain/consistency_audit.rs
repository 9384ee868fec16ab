//! Batch sweep comparing derived counters against the booking rows.
//!
//! The auditor finds three kinds of inconsistency:
//!
//! - live bookings whose member or class has been deleted ("orphans");
//! - classes whose cached `current_participants` differs from the number of
//!   slot-occupying bookings;
//! - active packages whose `remaining_sessions` differs from
//!   `total_sessions` minus the confirmed bookings made since assignment.
//!
//! In [`AuditMode::Fix`] orphans are cancelled first, so the participant and
//! session sweeps already see the post-cancellation rows and an immediate
//! second run finds nothing. A dry run leaves the orphans live but discounts
//! them from both sweeps, so it reports exactly what a fix run would change.
//! Every run appends one audit log entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::port_errors::{
    map_audit_log_error, map_booking_error, map_gym_class_error, map_package_error,
};
use super::ports::{
    AuditLogEntry, AuditLogRepository, BookingRepository, GymClassRepository, OrphanedBooking,
    UserPackageRepository,
};
use super::{BookingStatus, Error, GymClassId, PackageId, UserId};

/// Action name recorded in the audit log.
pub const CONSISTENCY_CHECK_ACTION: &str = "consistency_check";

/// Whether the sweep only reports or also corrects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Report findings without writing anything but the audit log.
    DryRun,
    /// Correct every finding.
    Fix,
}

impl AuditMode {
    /// Whether this mode writes corrections.
    #[must_use]
    pub const fn applies_fixes(self) -> bool {
        matches!(self, Self::Fix)
    }
}

/// A class whose cached participant count is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantDrift {
    /// Affected class.
    pub class_id: GymClassId,
    /// Class name, for operator output.
    pub class_name: String,
    /// Value currently stored.
    pub stored: u32,
    /// Value recomputed from bookings.
    pub actual: u32,
}

/// An active package whose balance disagrees with its confirmed bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDrift {
    /// Affected package.
    pub package_id: PackageId,
    /// Package owner.
    pub user_id: UserId,
    /// Sessions granted.
    pub total_sessions: u32,
    /// Confirmed bookings made since assignment.
    pub used_sessions: u32,
    /// Balance currently stored.
    pub stored: u32,
    /// `total_sessions - used_sessions`, floored at zero.
    pub expected: u32,
}

/// Findings and corrections from one sweep.
///
/// Drift is computed as if the orphans were already cancelled, so a dry run
/// and a fix run over the same rows report the same findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Mode the sweep ran in.
    pub mode: AuditMode,
    /// Orphaned bookings found.
    pub orphaned_bookings: Vec<OrphanedBooking>,
    /// Classes with a wrong participant count.
    pub participant_drift: Vec<ParticipantDrift>,
    /// Packages with a wrong balance.
    pub session_drift: Vec<SessionDrift>,
    /// Orphans moved to `cancelled`.
    pub orphans_cancelled: usize,
    /// Participant counts rewritten.
    pub participants_fixed: usize,
    /// Package balances rewritten.
    pub sessions_fixed: usize,
    /// When the sweep finished.
    pub completed_at: DateTime<Utc>,
}

impl AuditReport {
    /// Total findings across all categories.
    #[must_use]
    pub fn issues_found(&self) -> usize {
        self.orphaned_bookings.len() + self.participant_drift.len() + self.session_drift.len()
    }

    /// Total rows corrected.
    #[must_use]
    pub fn fixes_applied(&self) -> usize {
        self.orphans_cancelled + self.participants_fixed + self.sessions_fixed
    }

    /// Whether the sweep found nothing.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.issues_found() == 0
    }

    /// Audit log record summarising this report.
    #[must_use]
    pub fn to_audit_log_entry(&self) -> AuditLogEntry {
        AuditLogEntry {
            action: CONSISTENCY_CHECK_ACTION.to_owned(),
            issues_found: self.issues_found(),
            fixed: self.mode.applies_fixes(),
            details: json!({
                "orphaned_bookings": self.orphaned_bookings.len(),
                "participant_drift": self.participant_drift.len(),
                "session_drift": self.session_drift.len(),
                "orphans_cancelled": self.orphans_cancelled,
                "participants_fixed": self.participants_fixed,
                "sessions_fixed": self.sessions_fixed,
            }),
            recorded_at: self.completed_at,
        }
    }
}

/// Port bundle required by the auditor.
pub struct ConsistencyAuditorPorts {
    /// Class reads and participant count writes.
    pub classes: Arc<dyn GymClassRepository>,
    /// Booking counts and orphan cancellation.
    pub bookings: Arc<dyn BookingRepository>,
    /// Package reads and balance writes.
    pub packages: Arc<dyn UserPackageRepository>,
    /// Audit log sink.
    pub audit_log: Arc<dyn AuditLogRepository>,
}

impl ConsistencyAuditorPorts {
    /// Build a strongly-typed auditor port bundle.
    pub fn new(
        classes: Arc<dyn GymClassRepository>,
        bookings: Arc<dyn BookingRepository>,
        packages: Arc<dyn UserPackageRepository>,
        audit_log: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self {
            classes,
            bookings,
            packages,
            audit_log,
        }
    }
}

/// Sequential consistency sweep over persisted state.
pub struct ConsistencyAuditor {
    ports: ConsistencyAuditorPorts,
    clock: Arc<dyn Clock>,
}

impl ConsistencyAuditor {
    /// Create an auditor.
    pub fn new(ports: ConsistencyAuditorPorts, clock: Arc<dyn Clock>) -> Self {
        Self { ports, clock }
    }

    /// Run one sweep.
    ///
    /// # Errors
    ///
    /// Returns a domain error when any repository fails. Corrections already
    /// written stay written; rerunning is safe.
    pub async fn run(&self, mode: AuditMode) -> Result<AuditReport, Error> {
        let (orphaned_bookings, orphans_cancelled) = self.sweep_orphans(mode).await?;
        let live_orphans: &[OrphanedBooking] = if mode.applies_fixes() {
            &[]
        } else {
            &orphaned_bookings
        };
        let (participant_drift, participants_fixed) =
            self.sweep_participants(mode, live_orphans).await?;
        let (session_drift, sessions_fixed) = self.sweep_sessions(mode, live_orphans).await?;

        let report = AuditReport {
            mode,
            orphaned_bookings,
            participant_drift,
            session_drift,
            orphans_cancelled,
            participants_fixed,
            sessions_fixed,
            completed_at: self.clock.utc(),
        };

        self.ports
            .audit_log
            .record(&report.to_audit_log_entry())
            .await
            .map_err(map_audit_log_error)?;

        info!(
            ?mode,
            issues_found = report.issues_found(),
            fixes_applied = report.fixes_applied(),
            "consistency check finished"
        );
        Ok(report)
    }

    async fn sweep_orphans(&self, mode: AuditMode) -> Result<(Vec<OrphanedBooking>, usize), Error> {
        let orphans = self
            .ports
            .bookings
            .list_orphaned()
            .await
            .map_err(map_booking_error)?;
        for orphan in &orphans {
            warn!(
                booking_id = %orphan.booking_id,
                user_id = %orphan.user_id,
                class_id = %orphan.class_id,
                missing = ?orphan.missing,
                "orphaned booking"
            );
        }
        if !mode.applies_fixes() || orphans.is_empty() {
            return Ok((orphans, 0));
        }

        let ids: Vec<_> = orphans.iter().map(|orphan| orphan.booking_id).collect();
        let cancelled = self
            .ports
            .bookings
            .cancel_bookings(&ids)
            .await
            .map_err(map_booking_error)?;
        info!(cancelled, "orphaned bookings cancelled");
        Ok((orphans, cancelled))
    }

    async fn sweep_participants(
        &self,
        mode: AuditMode,
        live_orphans: &[OrphanedBooking],
    ) -> Result<(Vec<ParticipantDrift>, usize), Error> {
        let classes = self
            .ports
            .classes
            .list_all()
            .await
            .map_err(map_gym_class_error)?;

        let mut drift = Vec::new();
        let mut fixed = 0;
        for class in classes {
            let counted = self
                .ports
                .bookings
                .count_occupying(class.id)
                .await
                .map_err(map_booking_error)?;
            let actual = counted.saturating_sub(count_matching(live_orphans, |orphan| {
                orphan.class_id == class.id && orphan.status.occupies_slot()
            }));
            if actual == class.current_participants {
                continue;
            }
            warn!(
                class_id = %class.id,
                stored = class.current_participants,
                actual,
                "participant count drift"
            );
            if mode.applies_fixes() {
                self.ports
                    .classes
                    .set_current_participants(class.id, actual)
                    .await
                    .map_err(map_gym_class_error)?;
                fixed += 1;
            }
            drift.push(ParticipantDrift {
                class_id: class.id,
                class_name: class.name,
                stored: class.current_participants,
                actual,
            });
        }
        Ok((drift, fixed))
    }

    async fn sweep_sessions(
        &self,
        mode: AuditMode,
        live_orphans: &[OrphanedBooking],
    ) -> Result<(Vec<SessionDrift>, usize), Error> {
        let packages = self
            .ports
            .packages
            .list_active()
            .await
            .map_err(map_package_error)?;

        let mut drift = Vec::new();
        let mut fixed = 0;
        for package in packages {
            let counted = self
                .ports
                .bookings
                .count_confirmed_since(package.user_id, package.created_at)
                .await
                .map_err(map_booking_error)?;
            let used = counted.saturating_sub(count_matching(live_orphans, |orphan| {
                orphan.user_id == package.user_id
                    && orphan.status == BookingStatus::Confirmed
                    && orphan.created_at >= package.created_at
            }));
            let expected = package.total_sessions.saturating_sub(used);
            if expected == package.remaining_sessions {
                continue;
            }
            warn!(
                package_id = %package.id,
                user_id = %package.user_id,
                stored = package.remaining_sessions,
                expected,
                "session balance drift"
            );
            if mode.applies_fixes() {
                self.ports
                    .packages
                    .set_remaining_sessions(package.id, expected)
                    .await
                    .map_err(map_package_error)?;
                fixed += 1;
            }
            drift.push(SessionDrift {
                package_id: package.id,
                user_id: package.user_id,
                total_sessions: package.total_sessions,
                used_sessions: used,
                stored: package.remaining_sessions,
                expected,
            });
        }
        Ok((drift, fixed))
    }
}

fn count_matching(
    orphans: &[OrphanedBooking],
    predicate: impl Fn(&OrphanedBooking) -> bool,
) -> u32 {
    let matching = orphans.iter().filter(|orphan| predicate(orphan)).count();
    u32::try_from(matching).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[path = "consistency_audit_tests.rs"]
mod tests;
