//! Behavioural tests for the batch consistency audit.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use gym_backend::domain::ports::UserPackageRepository;
use gym_backend::domain::{
    AuditMode, AuditReport, BookingId, BookingStatus, ConsistencyAuditor,
    ConsistencyAuditorPorts, Error, ErrorCode, GymClassId, PackageId, PackageKind, UserId,
};
use gym_backend::test_support::{FixedClock, InMemoryGymStore, StoreFault};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::{Builder, Runtime};

struct ConsistencyAuditWorld {
    runtime: Runtime,
    store: Arc<InMemoryGymStore>,
    auditor: ConsistencyAuditor,
    now: DateTime<Utc>,
    member: Option<UserId>,
    package: Option<PackageId>,
    class: Option<GymClassId>,
    bookings: Vec<BookingId>,
    result: Option<Result<AuditReport, Error>>,
}

impl ConsistencyAuditWorld {
    fn report(&self) -> &AuditReport {
        match self.result.as_ref() {
            Some(Ok(report)) => report,
            other => panic!("expected a report, got {other:?}"),
        }
    }

    fn run(&mut self, mode: AuditMode) {
        let result = self.runtime.block_on(self.auditor.run(mode));
        self.result = Some(result);
    }
}

#[fixture]
fn world() -> ConsistencyAuditWorld {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime should initialize");
    let now = Utc
        .with_ymd_and_hms(2026, 3, 2, 3, 0, 0)
        .single()
        .expect("valid timestamp");
    let store = Arc::new(InMemoryGymStore::new());
    let auditor = ConsistencyAuditor::new(
        ConsistencyAuditorPorts::new(store.clone(), store.clone(), store.clone(), store.clone()),
        Arc::new(FixedClock::new(now)),
    );

    ConsistencyAuditWorld {
        runtime,
        store,
        auditor,
        now,
        member: None,
        package: None,
        class: None,
        bookings: Vec::new(),
        result: None,
    }
}

#[given("a member holding a session pack of {sessions} sessions")]
fn a_member_holding_a_session_pack(world: &mut ConsistencyAuditWorld, sessions: u32) {
    let member = world.store.add_user();
    world.package = Some(world.store.add_package(
        member,
        PackageKind::SessionPack,
        sessions,
        NaiveDate::from_ymd_opt(2026, 12, 31).expect("valid date"),
        world.now - TimeDelta::days(30),
    ));
    world.member = Some(member);
}

#[given("the member has {count} confirmed bookings in a class nobody reconciled")]
fn the_member_has_unreconciled_bookings(world: &mut ConsistencyAuditWorld, count: u32) {
    let member = world.member.expect("member should be registered");
    let class = world
        .store
        .add_class("Evening Yoga", 20, world.now + TimeDelta::days(1));
    for offset in 0..count {
        let at = world.now - TimeDelta::hours(i64::from(offset) + 1);
        let event = world
            .store
            .create_booking(member, class, BookingStatus::Confirmed, at);
        world.bookings.push(event.booking().id);
    }
    world.class = Some(class);
}

#[given("the counters already match the bookings")]
fn the_counters_already_match_the_bookings(world: &mut ConsistencyAuditWorld) {
    let booked = u32::try_from(world.bookings.len()).expect("booking count fits");
    let class = world.class.expect("class should be scheduled");
    let package = world.package.expect("package should be assigned");
    world.store.corrupt_participants(class, booked);
    let total = world
        .store
        .package(package)
        .expect("package exists")
        .total_sessions;
    world.store.corrupt_remaining(package, total - booked);
}

#[given("the member is deleted")]
fn the_member_is_deleted(world: &mut ConsistencyAuditWorld) {
    world
        .store
        .delete_user(world.member.expect("member should be registered"));
}

#[given("the audit log is unavailable")]
fn the_audit_log_is_unavailable(world: &mut ConsistencyAuditWorld) {
    world.store.inject_fault(StoreFault::AuditWrite, 1);
}

#[when("a dry-run consistency check runs")]
fn a_dry_run_consistency_check_runs(world: &mut ConsistencyAuditWorld) {
    world.run(AuditMode::DryRun);
}

#[when("a consistency check with fixes runs")]
fn a_consistency_check_with_fixes_runs(world: &mut ConsistencyAuditWorld) {
    world.run(AuditMode::Fix);
}

#[then("{count} issues are reported")]
fn issues_are_reported(world: &mut ConsistencyAuditWorld, count: usize) {
    assert_eq!(world.report().issues_found(), count);
}

#[then("{count} orphaned bookings are reported")]
fn orphaned_bookings_are_reported(world: &mut ConsistencyAuditWorld, count: usize) {
    let report = world.report();
    assert_eq!(report.orphaned_bookings.len(), count);
    assert_eq!(report.orphans_cancelled, count);
}

#[then("every booking is cancelled")]
fn every_booking_is_cancelled(world: &mut ConsistencyAuditWorld) {
    for id in &world.bookings {
        let booking = world.store.booking(*id).expect("booking exists");
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }
}

#[then("the class participant count is {count}")]
fn the_class_participant_count_is(world: &mut ConsistencyAuditWorld, count: u32) {
    let class = world.class.expect("class should be scheduled");
    let stored = world.store.class(class).expect("class exists");
    assert_eq!(stored.current_participants, count);
}

#[then("the member's balance is {remaining}")]
fn the_members_balance_is(world: &mut ConsistencyAuditWorld, remaining: u32) {
    let member = world.member.expect("member should be registered");
    let packages = world
        .runtime
        .block_on(world.store.list_for_user(member))
        .expect("packages load");
    let balances: Vec<u32> = packages
        .iter()
        .map(|package| package.remaining_sessions)
        .collect();
    assert_eq!(balances, vec![remaining]);
}

fn assert_last_audit_entry(world: &ConsistencyAuditWorld, issues: usize, fixed: bool) {
    let entries = world.store.audit_entries();
    let entry = entries.last().expect("an audit entry should be recorded");
    assert_eq!(entry.action, "consistency_check");
    assert_eq!(entry.issues_found, issues);
    assert_eq!(entry.fixed, fixed);
    assert_eq!(entry.recorded_at, world.now);
}

#[then("the audit log records {issues} issues without fixes")]
fn the_audit_log_records_without_fixes(world: &mut ConsistencyAuditWorld, issues: usize) {
    assert_last_audit_entry(world, issues, false);
}

#[then("the audit log records {issues} issues with fixes")]
fn the_audit_log_records_with_fixes(world: &mut ConsistencyAuditWorld, issues: usize) {
    assert_last_audit_entry(world, issues, true);
}

#[then("the check fails as service unavailable")]
fn the_check_fails_as_service_unavailable(world: &mut ConsistencyAuditWorld) {
    match world.result.as_ref() {
        Some(Err(error)) => assert_eq!(error.code(), ErrorCode::ServiceUnavailable),
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(world.store.audit_entries().is_empty());
}

#[scenario(
    path = "tests/features/consistency_audit.feature",
    name = "A dry run reports drift without changing anything"
)]
fn dry_run_reports_drift(world: ConsistencyAuditWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/consistency_audit.feature",
    name = "Fix mode repairs drift and a second run is clean"
)]
fn fix_mode_repairs_drift(world: ConsistencyAuditWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/consistency_audit.feature",
    name = "Orphaned bookings are cancelled before counts are recomputed"
)]
fn orphans_are_cancelled_first(world: ConsistencyAuditWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/consistency_audit.feature",
    name = "A consistent store still leaves an audit trail"
)]
fn consistent_store_leaves_audit_trail(world: ConsistencyAuditWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/consistency_audit.feature",
    name = "An audit log outage fails the check"
)]
fn audit_log_outage_fails_the_check(world: ConsistencyAuditWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/consistency_audit.feature",
    name = "A dry run with orphans predicts what fix mode changes"
)]
fn dry_run_with_orphans_predicts_fix(world: ConsistencyAuditWorld) {
    drop(world);
}
