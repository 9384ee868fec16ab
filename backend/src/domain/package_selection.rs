//! Choice of the package a booking draws from or refunds to.

use chrono::{DateTime, Utc};

use super::{UserId, UserPackage};

/// Pick the package a member's booking settles against at `as_of`.
///
/// Candidates are the member's `active` packages assigned on or before
/// `as_of`. The one with the latest expiry date wins; on a tie the first
/// candidate in `packages` order wins. The remaining balance plays no part in
/// the choice, so a drained package with the latest expiry still wins.
///
/// # Examples
/// ```
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use gym_backend::domain::{
///     PackageId, PackageKind, PackageStatus, UserId, UserPackage, select_active_package,
/// };
///
/// let assigned = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
/// let package = |id, expiry| UserPackage {
///     id: PackageId::new(id),
///     user_id: UserId::new(1),
///     kind: PackageKind::SessionPack,
///     total_sessions: 10,
///     remaining_sessions: 10,
///     status: PackageStatus::Active,
///     expiry_date: expiry,
///     created_at: assigned,
/// };
/// let packages = vec![
///     package(1, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()),
///     package(2, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()),
/// ];
///
/// let chosen = select_active_package(&packages, UserId::new(1), Utc::now());
/// assert_eq!(chosen.map(|p| p.id), Some(PackageId::new(2)));
/// ```
#[must_use]
pub fn select_active_package(
    packages: &[UserPackage],
    user_id: UserId,
    as_of: DateTime<Utc>,
) -> Option<&UserPackage> {
    packages
        .iter()
        .filter(|package| {
            package.user_id == user_id && package.is_active() && package.created_at <= as_of
        })
        .fold(None, |best: Option<&UserPackage>, candidate| match best {
            Some(current) if current.expiry_date >= candidate.expiry_date => Some(current),
            _ => Some(candidate),
        })
}
