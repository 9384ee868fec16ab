//! Sweep bookings, classes, and packages for drift; optionally repair it.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;

use clap::Parser;
use gym_backend::config::ReconcilerSettings;
use gym_backend::domain::{AuditMode, AuditReport};
use gym_backend::outbound::persistence::DbPool;
use gym_backend::wiring::postgres_consistency_auditor;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// `check-consistency` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "check-consistency",
    about = "Report (and with --fix, repair) booking, participant, and session drift",
    version
)]
struct CliArgs {
    /// Apply corrections instead of only reporting them.
    #[arg(long)]
    fix: bool,
    /// Database connection URL. Falls back to `GYM_DATABASE_URL`, then
    /// `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

impl CliArgs {
    const fn mode(&self) -> AuditMode {
        if self.fix {
            AuditMode::Fix
        } else {
            AuditMode::DryRun
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
    let settings = ReconcilerSettings::load_from_iter([OsString::from("check-consistency")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let database_url = settings
        .resolve_database_url(args.database_url.clone())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;

    let pool = DbPool::new(settings.pool_config(&database_url))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;

    let report = postgres_consistency_auditor(&pool)
        .run(args.mode())
        .await
        .map_err(|error| io::Error::other(format!("consistency check failed: {error}")))?;

    for line in render_report(&report) {
        println!("{line}");
    }
    Ok(())
}

fn render_report(report: &AuditReport) -> Vec<String> {
    let mut lines = Vec::new();
    for orphan in &report.orphaned_bookings {
        lines.push(format!(
            "orphaned_booking id={} user_id={} class_id={} status={} missing={:?}",
            orphan.booking_id, orphan.user_id, orphan.class_id, orphan.status, orphan.missing
        ));
    }
    for drift in &report.participant_drift {
        lines.push(format!(
            "participant_drift class_id={} name={:?} stored={} actual={}",
            drift.class_id, drift.class_name, drift.stored, drift.actual
        ));
    }
    for drift in &report.session_drift {
        lines.push(format!(
            "session_drift package_id={} user_id={} total={} used={} stored={} expected={}",
            drift.package_id,
            drift.user_id,
            drift.total_sessions,
            drift.used_sessions,
            drift.stored,
            drift.expected
        ));
    }
    lines.push(format!("mode={:?}", report.mode));
    lines.push(format!("issues_found={}", report.issues_found()));
    lines.push(format!("orphans_cancelled={}", report.orphans_cancelled));
    lines.push(format!("participants_fixed={}", report.participants_fixed));
    lines.push(format!("sessions_fixed={}", report.sessions_fixed));
    lines.push(format!("completed_at={}", report.completed_at.to_rfc3339()));
    lines
}
