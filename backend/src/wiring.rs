//! Startup wiring for listeners, the event worker, and batch services.
//!
//! Subscriptions are explicit: the bus is built once here with every
//! listener's ports already injected.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};

use crate::domain::ports::{
    AuditLogRepository, BookingRepository, GymClassRepository, MemberRepository, SessionNotifier,
    UserPackageRepository,
};
use crate::domain::{
    BookingEventBus, BookingEventQueue, BookingEventReceiver, BookingEventWorker,
    ConsistencyAuditor, ConsistencyAuditorPorts, PackageAssignmentService,
    PackageExtensionService, ParticipantCountReconciler, SessionLedgerReconciler, WorkerConfig,
};
use crate::outbound::notifications::TracingSessionNotifier;
use crate::outbound::persistence::{
    DbPool, DieselAuditLogRepository, DieselBookingRepository, DieselGymClassRepository,
    DieselMemberRepository, DieselUserPackageRepository,
};

/// Ports consumed by the booking event listeners.
pub struct ListenerPorts<C, B, P, M, N> {
    /// Class reads and participant count writes.
    pub classes: Arc<C>,
    /// Booking counts.
    pub bookings: Arc<B>,
    /// Package ledger.
    pub packages: Arc<P>,
    /// Member existence checks.
    pub members: Arc<M>,
    /// Low-balance signal sink.
    pub notifier: Arc<N>,
    /// Time source for journal entries.
    pub clock: Arc<dyn Clock>,
}

/// Build the bus with the participant count and session ledger listeners.
pub fn booking_event_bus<C, B, P, M, N>(ports: ListenerPorts<C, B, P, M, N>) -> BookingEventBus
where
    C: GymClassRepository + 'static,
    B: BookingRepository + 'static,
    P: UserPackageRepository + 'static,
    M: MemberRepository + 'static,
    N: SessionNotifier + 'static,
{
    BookingEventBus::new()
        .subscribe(Arc::new(ParticipantCountReconciler::new(
            ports.classes,
            ports.bookings,
        )))
        .subscribe(Arc::new(SessionLedgerReconciler::new(
            ports.packages,
            ports.members,
            ports.notifier,
            ports.clock,
        )))
}

/// Listener ports backed by PostgreSQL and the tracing notifier.
pub fn postgres_listener_ports(
    pool: &DbPool,
) -> ListenerPorts<
    DieselGymClassRepository,
    DieselBookingRepository,
    DieselUserPackageRepository,
    DieselMemberRepository,
    TracingSessionNotifier,
> {
    ListenerPorts {
        classes: Arc::new(DieselGymClassRepository::new(pool.clone())),
        bookings: Arc::new(DieselBookingRepository::new(pool.clone())),
        packages: Arc::new(DieselUserPackageRepository::new(pool.clone())),
        members: Arc::new(DieselMemberRepository::new(pool.clone())),
        notifier: Arc::new(TracingSessionNotifier),
        clock: system_clock(),
    }
}

/// Queue, receiver, and worker ready to spawn.
///
/// # Examples
///
/// ```no_run
/// use gym_backend::domain::WorkerConfig;
/// use gym_backend::outbound::persistence::{DbPool, PoolConfig};
/// use gym_backend::wiring::{booking_event_pipeline, postgres_listener_ports};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = DbPool::new(PoolConfig::new("postgres://localhost/gym")).await?;
/// let (queue, inbox, worker) =
///     booking_event_pipeline(postgres_listener_ports(&pool), 1024, WorkerConfig::default());
/// let handle = tokio::spawn(worker.run(inbox));
/// drop(queue);
/// let summary = handle.await?;
/// assert_eq!(summary.abandoned, 0);
/// # Ok(())
/// # }
/// ```
pub fn booking_event_pipeline<C, B, P, M, N>(
    ports: ListenerPorts<C, B, P, M, N>,
    queue_capacity: usize,
    config: WorkerConfig,
) -> (BookingEventQueue, BookingEventReceiver, BookingEventWorker)
where
    C: GymClassRepository + 'static,
    B: BookingRepository + 'static,
    P: UserPackageRepository + 'static,
    M: MemberRepository + 'static,
    N: SessionNotifier + 'static,
{
    let (queue, inbox) = BookingEventQueue::bounded(queue_capacity);
    let worker = BookingEventWorker::new(booking_event_bus(ports), config);
    (queue, inbox, worker)
}

/// Consistency auditor over PostgreSQL.
pub fn postgres_consistency_auditor(pool: &DbPool) -> ConsistencyAuditor {
    let classes: Arc<dyn GymClassRepository> =
        Arc::new(DieselGymClassRepository::new(pool.clone()));
    let bookings: Arc<dyn BookingRepository> =
        Arc::new(DieselBookingRepository::new(pool.clone()));
    let packages: Arc<dyn UserPackageRepository> =
        Arc::new(DieselUserPackageRepository::new(pool.clone()));
    let audit_log: Arc<dyn AuditLogRepository> =
        Arc::new(DieselAuditLogRepository::new(pool.clone()));
    ConsistencyAuditor::new(
        ConsistencyAuditorPorts::new(classes, bookings, packages, audit_log),
        system_clock(),
    )
}

/// Package assignment over PostgreSQL.
pub fn postgres_package_assignment(
    pool: &DbPool,
) -> PackageAssignmentService<DieselUserPackageRepository, DieselMemberRepository> {
    PackageAssignmentService::new(
        Arc::new(DieselUserPackageRepository::new(pool.clone())),
        Arc::new(DieselMemberRepository::new(pool.clone())),
        system_clock(),
    )
}

/// Bulk package extension over PostgreSQL.
pub fn postgres_package_extension(
    pool: &DbPool,
) -> PackageExtensionService<DieselUserPackageRepository> {
    PackageExtensionService::new(Arc::new(DieselUserPackageRepository::new(pool.clone())))
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(DefaultClock)
}
