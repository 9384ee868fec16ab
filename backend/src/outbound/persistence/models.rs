//! Internal Diesel row structs and their conversion to domain types.
//!
//! Rows never leave the persistence layer. Conversions report unreadable
//! values (unknown status text, negative counters) as plain strings that the
//! adapters wrap in their port's `Query` variant.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    GymClass, GymClassId, GymClassStatus, PackageId, PackageKind, PackageStatus, UserId,
    UserPackage,
};

use super::schema::{audit_logs, gym_classes, session_ledger_entries, user_packages};

/// Convert a stored `INTEGER` counter to `u32`.
pub(crate) fn counter_from_db(column: &'static str, value: i32) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{column} holds negative value {value}"))
}

/// Convert a domain counter to `INTEGER`.
pub(crate) fn counter_to_db(column: &'static str, value: u32) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("{column} value {value} exceeds INTEGER"))
}

/// Convert a row count to `u32`.
pub(crate) fn count_from_db(value: i64) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row count {value} out of range"))
}

fn parse_text<T>(raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| err.to_string())
}

/// Row struct for reading `gym_classes`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = gym_classes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GymClassRow {
    pub id: i64,
    pub name: String,
    pub max_participants: i32,
    pub current_participants: i32,
    pub status: String,
    pub starts_at: DateTime<Utc>,
}

impl TryFrom<GymClassRow> for GymClass {
    type Error = String;

    fn try_from(row: GymClassRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: GymClassId::new(row.id),
            name: row.name,
            max_participants: counter_from_db("max_participants", row.max_participants)?,
            current_participants: counter_from_db(
                "current_participants",
                row.current_participants,
            )?,
            status: parse_text::<GymClassStatus>(&row.status)?,
            starts_at: row.starts_at,
        })
    }
}

/// Row struct for reading `user_packages`.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserPackageRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub total_sessions: i32,
    pub remaining_sessions: i32,
    pub status: String,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserPackageRow> for UserPackage {
    type Error = String;

    fn try_from(row: UserPackageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PackageId::new(row.id),
            user_id: UserId::new(row.user_id),
            kind: parse_text::<PackageKind>(&row.kind)?,
            total_sessions: counter_from_db("total_sessions", row.total_sessions)?,
            remaining_sessions: counter_from_db("remaining_sessions", row.remaining_sessions)?,
            status: parse_text::<PackageStatus>(&row.status)?,
            expiry_date: row.expiry_date,
            created_at: row.created_at,
        })
    }
}

/// Insertable struct for assigning a package.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_packages)]
pub(crate) struct NewUserPackageRow<'a> {
    pub user_id: i64,
    pub kind: &'a str,
    pub total_sessions: i32,
    pub remaining_sessions: i32,
    pub status: &'a str,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for journalling a ledger adjustment.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = session_ledger_entries)]
pub(crate) struct NewLedgerEntryRow<'a> {
    pub event_id: Uuid,
    pub kind: &'a str,
    pub booking_id: i64,
    pub package_id: i64,
    pub remaining_after: i32,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for audit log entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_logs)]
pub(crate) struct NewAuditLogRow<'a> {
    pub action: &'a str,
    pub issues_found: i32,
    pub fixed: bool,
    pub details: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn package_row(status: &str, remaining: i32) -> UserPackageRow {
        UserPackageRow {
            id: 4,
            user_id: 9,
            kind: "session_pack".to_owned(),
            total_sessions: 10,
            remaining_sessions: remaining,
            status: status.to_owned(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date"),
            created_at: Utc
                .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
                .single()
                .expect("valid timestamp"),
        }
    }

    #[rstest]
    fn package_row_converts() {
        let package = UserPackage::try_from(package_row("frozen", 3)).expect("row converts");
        assert_eq!(package.status, PackageStatus::Frozen);
        assert_eq!(package.remaining_sessions, 3);
    }

    #[rstest]
    #[case("frozen", -1, "remaining_sessions holds negative value -1")]
    #[case("lapsed", 3, "unknown PackageStatus value: \"lapsed\"")]
    fn unreadable_rows_are_reported(
        #[case] status: &str,
        #[case] remaining: i32,
        #[case] expected: &str,
    ) {
        let err = UserPackage::try_from(package_row(status, remaining)).expect_err("row rejected");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn oversized_counter_is_rejected() {
        assert!(counter_to_db("remaining_sessions", u32::MAX).is_err());
        assert_eq!(counter_to_db("remaining_sessions", 7), Ok(7));
    }
}
