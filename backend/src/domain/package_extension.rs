//! Bulk package extension: filter, preview, apply.
//!
//! Staff pick packages by status, kind, owner, and expiry, then add days to
//! the expiry date and/or sessions to both the total and the balance.
//! [`PackageExtensionService::preview`] never writes. `apply` selects the
//! same rows, then adds the extension to each package's balance as it stands
//! at write time, so ledger adjustments landing in between are kept.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::info;

use super::port_errors::map_package_error;
use super::ports::UserPackageRepository;
use super::{Error, PackageId, PackageKind, PackageStatus, UserId, UserPackage};

/// Which packages a bulk extension targets. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    /// Accepted statuses.
    pub statuses: BTreeSet<PackageStatus>,
    /// Accepted kind.
    pub kind: Option<PackageKind>,
    /// Accepted owners.
    pub user_ids: BTreeSet<UserId>,
    /// Only packages expiring on or before this day.
    pub expiring_on_or_before: Option<NaiveDate>,
}

impl PackageFilter {
    /// Whether `package` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, package: &UserPackage) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&package.status))
            && self.kind.is_none_or(|kind| kind == package.kind)
            && (self.user_ids.is_empty() || self.user_ids.contains(&package.user_id))
            && self
                .expiring_on_or_before
                .is_none_or(|limit| package.expiry_date <= limit)
    }
}

/// How much to extend each selected package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageExtension {
    extra_days: u32,
    extra_sessions: u32,
}

impl PackageExtension {
    /// Validate and build an extension.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` when both amounts are zero.
    pub fn new(extra_days: u32, extra_sessions: u32) -> Result<Self, Error> {
        if extra_days == 0 && extra_sessions == 0 {
            return Err(Error::invalid_request(
                "extension must add days, sessions, or both",
            ));
        }
        Ok(Self {
            extra_days,
            extra_sessions,
        })
    }

    /// Days added to the expiry date.
    #[must_use]
    pub fn extra_days(&self) -> u32 {
        self.extra_days
    }

    /// Sessions added to total and balance.
    #[must_use]
    pub fn extra_sessions(&self) -> u32 {
        self.extra_sessions
    }

    /// `package` with this extension added, or `None` when a value would
    /// overflow.
    #[must_use]
    pub fn extend(self, package: &UserPackage) -> Option<UserPackage> {
        Some(UserPackage {
            expiry_date: package
                .expiry_date
                .checked_add_days(Days::new(u64::from(self.extra_days)))?,
            total_sessions: package.total_sessions.checked_add(self.extra_sessions)?,
            remaining_sessions: package.remaining_sessions.checked_add(self.extra_sessions)?,
            ..package.clone()
        })
    }
}

/// Before and after values for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionPreview {
    /// Package affected.
    pub package_id: PackageId,
    /// Owner.
    pub user_id: UserId,
    /// Expiry before.
    pub current_expiry: NaiveDate,
    /// Expiry after.
    pub new_expiry: NaiveDate,
    /// Total before.
    pub current_total: u32,
    /// Total after.
    pub new_total: u32,
    /// Balance before.
    pub current_remaining: u32,
    /// Balance after.
    pub new_remaining: u32,
}

/// Compute the extension of one package without touching storage.
///
/// # Errors
///
/// Returns `invalid_request` when the new date or counts overflow.
///
/// # Examples
/// ```
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use gym_backend::domain::{
///     PackageExtension, PackageId, PackageKind, PackageStatus, UserId, UserPackage,
///     preview_extension,
/// };
///
/// let package = UserPackage {
///     id: PackageId::new(1),
///     user_id: UserId::new(1),
///     kind: PackageKind::SessionPack,
///     total_sessions: 10,
///     remaining_sessions: 4,
///     status: PackageStatus::Active,
///     expiry_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
///     created_at: Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
/// };
/// let extension = PackageExtension::new(7, 2).unwrap();
///
/// let preview = preview_extension(&package, extension).unwrap();
/// assert_eq!(preview.new_expiry, NaiveDate::from_ymd_opt(2026, 2, 7).unwrap());
/// assert_eq!((preview.new_total, preview.new_remaining), (12, 6));
/// ```
pub fn preview_extension(
    package: &UserPackage,
    extension: PackageExtension,
) -> Result<ExtensionPreview, Error> {
    let extended = extension.extend(package).ok_or_else(|| {
        Error::invalid_request(format!("extension overflows package {}", package.id))
    })?;
    Ok(ExtensionPreview::between(package, &extended))
}

impl ExtensionPreview {
    fn between(before: &UserPackage, after: &UserPackage) -> Self {
        Self {
            package_id: after.id,
            user_id: after.user_id,
            current_expiry: before.expiry_date,
            new_expiry: after.expiry_date,
            current_total: before.total_sessions,
            new_total: after.total_sessions,
            current_remaining: before.remaining_sessions,
            new_remaining: after.remaining_sessions,
        }
    }

    /// Row for a package as written, with the prior values worked back from
    /// the extension.
    fn written(after: &UserPackage, extension: PackageExtension) -> Self {
        let before = UserPackage {
            expiry_date: after
                .expiry_date
                .checked_sub_days(Days::new(u64::from(extension.extra_days)))
                .unwrap_or(after.expiry_date),
            total_sessions: after.total_sessions.saturating_sub(extension.extra_sessions),
            remaining_sessions: after
                .remaining_sessions
                .saturating_sub(extension.extra_sessions),
            ..after.clone()
        };
        Self::between(&before, after)
    }
}

/// Service running bulk extensions against the package store.
pub struct PackageExtensionService<P> {
    packages: Arc<P>,
}

impl<P> PackageExtensionService<P>
where
    P: UserPackageRepository,
{
    /// Create the service.
    pub fn new(packages: Arc<P>) -> Self {
        Self { packages }
    }

    /// Show what an extension would change.
    ///
    /// # Errors
    ///
    /// Returns a domain error when the store fails or a package would
    /// overflow.
    pub async fn preview(
        &self,
        filter: &PackageFilter,
        extension: PackageExtension,
    ) -> Result<Vec<ExtensionPreview>, Error> {
        let packages = self
            .packages
            .list_all()
            .await
            .map_err(map_package_error)?;
        packages
            .iter()
            .filter(|package| filter.matches(package))
            .map(|package| preview_extension(package, extension))
            .collect()
    }

    /// Apply an extension and return the rows as written.
    ///
    /// Selection uses the listed snapshot; the written values come from the
    /// store, which extends each row as it stands at write time.
    ///
    /// # Errors
    ///
    /// Returns a domain error on the first failing write. Earlier writes stay
    /// applied.
    pub async fn apply(
        &self,
        filter: &PackageFilter,
        extension: PackageExtension,
    ) -> Result<Vec<ExtensionPreview>, Error> {
        let previews = self.preview(filter, extension).await?;
        let mut written = Vec::with_capacity(previews.len());
        for row in &previews {
            let package = self
                .packages
                .apply_extension(row.package_id, extension)
                .await
                .map_err(map_package_error)?;
            written.push(ExtensionPreview::written(&package, extension));
        }
        info!(
            packages = written.len(),
            extra_days = extension.extra_days,
            extra_sessions = extension.extra_sessions,
            "bulk package extension applied"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::eq;
    use rstest::{fixture, rstest};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::domain::ports::{
        LedgerAdjustment, LedgerEntryKind, LedgerReceipt, MockUserPackageRepository,
        UserPackageRepositoryError,
    };
    use crate::domain::{BookingId, ErrorCode, NewUserPackage};
    use crate::test_support::InMemoryGymStore;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).expect("valid date")
    }

    fn assigned_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn package(id: i64, user: i64, status: PackageStatus, expiry: NaiveDate) -> UserPackage {
        UserPackage {
            id: PackageId::new(id),
            user_id: UserId::new(user),
            kind: PackageKind::SessionPack,
            total_sessions: 10,
            remaining_sessions: 3,
            status,
            expiry_date: expiry,
            created_at: Utc
                .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
                .single()
                .expect("valid timestamp"),
        }
    }

    #[fixture]
    fn holdings() -> Vec<UserPackage> {
        vec![
            package(1, 1, PackageStatus::Active, date(3, 1)),
            package(2, 2, PackageStatus::Frozen, date(3, 15)),
            package(3, 1, PackageStatus::Active, date(9, 1)),
        ]
    }

    #[rstest]
    fn empty_filter_matches_everything(holdings: Vec<UserPackage>) {
        let filter = PackageFilter::default();
        assert!(holdings.iter().all(|p| filter.matches(p)));
    }

    #[rstest]
    fn criteria_combine(holdings: Vec<UserPackage>) {
        let filter = PackageFilter {
            statuses: BTreeSet::from([PackageStatus::Active]),
            user_ids: BTreeSet::from([UserId::new(1)]),
            expiring_on_or_before: Some(date(3, 31)),
            ..PackageFilter::default()
        };
        let ids: Vec<_> = holdings
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![PackageId::new(1)]);
    }

    #[rstest]
    fn kind_filter_excludes_other_kinds(holdings: Vec<UserPackage>) {
        let filter = PackageFilter {
            kind: Some(PackageKind::Membership),
            ..PackageFilter::default()
        };
        assert!(!holdings.iter().any(|p| filter.matches(p)));
    }

    #[rstest]
    fn zero_extension_is_rejected() {
        let error = PackageExtension::new(0, 0).expect_err("empty extension");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn session_overflow_is_rejected() {
        let mut full = package(1, 1, PackageStatus::Active, date(3, 1));
        full.total_sessions = u32::MAX;
        let extension = PackageExtension::new(0, 1).expect("valid extension");
        assert!(preview_extension(&full, extension).is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn preview_never_writes(holdings: Vec<UserPackage>) {
        let mut packages = MockUserPackageRepository::new();
        packages.expect_list_all().return_once(move || Ok(holdings));
        packages.expect_apply_extension().never();

        let previews = PackageExtensionService::new(Arc::new(packages))
            .preview(
                &PackageFilter::default(),
                PackageExtension::new(30, 0).expect("valid extension"),
            )
            .await
            .expect("preview succeeds");
        assert_eq!(previews.len(), 3);
        assert_eq!(
            previews.first().map(|p| p.new_expiry),
            Some(date(3, 31))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn apply_writes_each_selected_package(holdings: Vec<UserPackage>) {
        let mut packages = MockUserPackageRepository::new();
        packages.expect_list_all().return_once(move || Ok(holdings));
        let extension = PackageExtension::new(0, 5).expect("valid extension");
        packages
            .expect_apply_extension()
            .with(eq(PackageId::new(2)), eq(extension))
            .times(1)
            .return_once(|_, _| {
                let mut written = package(2, 2, PackageStatus::Frozen, date(3, 15));
                written.total_sessions = 15;
                written.remaining_sessions = 8;
                Ok(written)
            });

        let filter = PackageFilter {
            statuses: BTreeSet::from([PackageStatus::Frozen]),
            ..PackageFilter::default()
        };
        let written = PackageExtensionService::new(Arc::new(packages))
            .apply(&filter, extension)
            .await
            .expect("apply succeeds");
        let row = written.first().expect("one row written");
        assert_eq!(written.len(), 1);
        assert_eq!((row.current_total, row.new_total), (10, 15));
        assert_eq!((row.current_remaining, row.new_remaining), (3, 8));
    }

    /// Store that lets a booking debit land between listing and writing.
    struct DebitBeforeWrite {
        store: InMemoryGymStore,
    }

    #[async_trait]
    impl UserPackageRepository for DebitBeforeWrite {
        async fn list_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
            self.store.list_for_user(user_id).await
        }

        async fn list_active(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
            self.store.list_active().await
        }

        async fn list_all(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
            self.store.list_all().await
        }

        async fn insert(
            &self,
            package: &NewUserPackage,
        ) -> Result<UserPackage, UserPackageRepositoryError> {
            self.store.insert(package).await
        }

        async fn debit_session(
            &self,
            package_id: PackageId,
            receipt: &LedgerReceipt,
        ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
            self.store.debit_session(package_id, receipt).await
        }

        async fn credit_session(
            &self,
            package_id: PackageId,
            receipt: &LedgerReceipt,
        ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
            self.store.credit_session(package_id, receipt).await
        }

        async fn set_remaining_sessions(
            &self,
            package_id: PackageId,
            remaining: u32,
        ) -> Result<(), UserPackageRepositoryError> {
            self.store.set_remaining_sessions(package_id, remaining).await
        }

        async fn apply_extension(
            &self,
            package_id: PackageId,
            extension: PackageExtension,
        ) -> Result<UserPackage, UserPackageRepositoryError> {
            let receipt = LedgerReceipt {
                event_id: Uuid::new_v4(),
                booking_id: BookingId::new(900),
                kind: LedgerEntryKind::Debit,
                recorded_at: assigned_at(),
            };
            self.store.debit_session(package_id, &receipt).await?;
            self.store.apply_extension(package_id, extension).await
        }
    }

    #[rstest]
    #[tokio::test]
    async fn apply_keeps_a_debit_landing_after_the_listing() {
        let store = InMemoryGymStore::new();
        let member = store.add_user();
        let package_id = store.add_package(
            member,
            PackageKind::SessionPack,
            10,
            date(6, 30),
            assigned_at(),
        );
        let repo = Arc::new(DebitBeforeWrite { store });

        let written = PackageExtensionService::new(Arc::clone(&repo))
            .apply(
                &PackageFilter::default(),
                PackageExtension::new(0, 5).expect("valid extension"),
            )
            .await
            .expect("apply succeeds");

        let stored = repo.store.package(package_id).expect("package exists");
        assert_eq!(stored.remaining_sessions, 14);
        assert_eq!(stored.total_sessions, 15);
        assert_eq!(repo.store.journal_len(), 1);
        assert_eq!(
            written.first().map(|row| (row.current_remaining, row.new_remaining)),
            Some((9, 14))
        );
    }
}
