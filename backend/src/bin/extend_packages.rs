//! Preview or apply a bulk extension to selected member packages.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;

use chrono::NaiveDate;
use clap::Parser;
use gym_backend::config::ReconcilerSettings;
use gym_backend::domain::{
    ExtensionPreview, PackageExtension, PackageFilter, PackageKind, PackageStatus, UserId,
};
use gym_backend::outbound::persistence::DbPool;
use gym_backend::wiring::postgres_package_extension;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// `extend-packages` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "extend-packages",
    about = "Extend expiry dates and session counts of matching packages",
    version
)]
struct CliArgs {
    /// Only packages in this status; repeat to accept several.
    #[arg(long = "status", value_name = "status")]
    statuses: Vec<PackageStatus>,
    /// Only packages of this kind.
    #[arg(long, value_name = "kind")]
    kind: Option<PackageKind>,
    /// Only packages owned by this member; repeat to accept several.
    #[arg(long = "user", value_name = "id")]
    users: Vec<i64>,
    /// Only packages expiring on or before this date (YYYY-MM-DD).
    #[arg(long = "expiring-before", value_name = "date")]
    expiring_before: Option<NaiveDate>,
    /// Days added to each expiry date.
    #[arg(long, default_value_t = 0)]
    days: u32,
    /// Sessions added to each total and balance.
    #[arg(long, default_value_t = 0)]
    sessions: u32,
    /// Write the changes. Without this flag only a preview is printed.
    #[arg(long)]
    apply: bool,
    /// Database connection URL. Falls back to `GYM_DATABASE_URL`, then
    /// `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

impl CliArgs {
    fn filter(&self) -> PackageFilter {
        PackageFilter {
            statuses: self.statuses.iter().copied().collect(),
            kind: self.kind,
            user_ids: self.users.iter().copied().map(UserId::new).collect(),
            expiring_on_or_before: self.expiring_before,
        }
    }
}

fn main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let extension = PackageExtension::new(args.days, args.sessions)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
    let settings = ReconcilerSettings::load_from_iter([OsString::from("extend-packages")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let database_url = settings
        .resolve_database_url(args.database_url.clone())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;

    let pool = DbPool::new(settings.pool_config(&database_url))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    let service = postgres_package_extension(&pool);

    let filter = args.filter();
    let rows = if args.apply {
        service.apply(&filter, extension).await
    } else {
        service.preview(&filter, extension).await
    }
    .map_err(|error| io::Error::other(format!("package extension failed: {error}")))?;

    for row in &rows {
        println!("{}", render_row(row));
    }
    println!("applied={}", args.apply);
    println!("packages={}", rows.len());
    Ok(())
}

fn render_row(row: &ExtensionPreview) -> String {
    format!(
        "package_id={} user_id={} expiry={}->{} total={}->{} remaining={}->{}",
        row.package_id,
        row.user_id,
        row.current_expiry,
        row.new_expiry,
        row.current_total,
        row.new_total,
        row.current_remaining,
        row.new_remaining
    )
}

#[cfg(test)]
mod tests {
    //! Unit tests for argument parsing and row rendering.

    use gym_backend::domain::PackageId;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn filter_flags_build_package_filter() {
        let args = CliArgs::try_parse_from([
            "extend-packages",
            "--status",
            "active",
            "--status",
            "frozen",
            "--kind",
            "session_pack",
            "--user",
            "7",
            "--expiring-before",
            "2026-03-31",
            "--days",
            "14",
        ])
        .expect("arguments parse");

        let filter = args.filter();
        assert_eq!(
            filter.statuses.into_iter().collect::<Vec<_>>(),
            vec![PackageStatus::Active, PackageStatus::Frozen]
        );
        assert_eq!(filter.kind, Some(PackageKind::SessionPack));
        assert!(filter.user_ids.contains(&UserId::new(7)));
        assert_eq!(filter.expiring_on_or_before, NaiveDate::from_ymd_opt(2026, 3, 31));
        assert!(!args.apply);
    }

    #[rstest]
    fn unknown_status_is_rejected() {
        assert!(CliArgs::try_parse_from(["extend-packages", "--status", "lapsed"]).is_err());
    }

    #[rstest]
    fn rows_show_before_and_after() {
        let date = |day| NaiveDate::from_ymd_opt(2026, 1, day).expect("valid date");
        let row = ExtensionPreview {
            package_id: PackageId::new(3),
            user_id: UserId::new(1),
            current_expiry: date(10),
            new_expiry: date(17),
            current_total: 10,
            new_total: 12,
            current_remaining: 1,
            new_remaining: 3,
        };
        assert_eq!(
            render_row(&row),
            "package_id=3 user_id=1 expiry=2026-01-10->2026-01-17 total=10->12 remaining=1->3"
        );
    }
}
