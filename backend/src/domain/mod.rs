//! Domain model and reconciliation services.
//!
//! Purpose: hold the booking, class, and package entities, the booking event
//! contracts, and the services that keep derived counters consistent with the
//! booking rows. Everything here talks to storage through [`ports`] only.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Booking, GymClass, UserPackage and their identifiers and statuses.
//! - BookingEvent and the outbound signals SessionsNearEnd and
//!   WaitlistSpotAvailable.
//! - ParticipantCountReconciler and SessionLedgerReconciler (event listeners).
//! - BookingEventBus, BookingEventQueue, and BookingEventWorker.
//! - ConsistencyAuditor, PackageAssignmentService, PackageExtensionService.

pub mod error;
pub mod ports;

mod booking;
mod booking_event_bus;
mod booking_event_worker;
mod booking_events;
mod consistency_audit;
mod gym_class;
mod ids;
mod package_assignment;
mod package_extension;
mod package_selection;
mod participant_count;
mod port_errors;
mod session_ledger;
pub(crate) mod text_enum;
mod user_package;

pub use self::booking::{Booking, BookingStatus};
pub use self::booking_event_bus::{
    BookingEventBus, BookingEventListener, DispatchError, ListenerFailure,
};
pub use self::booking_event_worker::{
    BookingEventQueue, BookingEventReceiver, BookingEventWorker, DeliveryOutcome,
    DeliverySleeper, QueueClosedError, TokioSleeper, WorkerConfig, WorkerSummary,
};
pub use self::booking_events::{
    BookingCancelled, BookingCreated, BookingEvent, BookingStatusChanged, BookingTransition,
    SessionsNearEnd, WaitlistSpotAvailable,
};
pub use self::consistency_audit::{
    AuditMode, AuditReport, CONSISTENCY_CHECK_ACTION, ConsistencyAuditor,
    ConsistencyAuditorPorts, ParticipantDrift, SessionDrift,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::gym_class::{GymClass, GymClassStatus};
pub use self::ids::{BookingId, GymClassId, PackageId, UserId};
pub use self::package_assignment::{AssignPackageRequest, PackageAssignmentService};
pub use self::package_extension::{
    ExtensionPreview, PackageExtension, PackageExtensionService, PackageFilter,
    preview_extension,
};
pub use self::package_selection::select_active_package;
pub use self::participant_count::ParticipantCountReconciler;
pub use self::session_ledger::{LedgerOutcome, LedgerSkipReason, SessionLedgerReconciler};
pub use self::text_enum::UnknownVariantError;
pub use self::user_package::{NewUserPackage, PackageKind, PackageStatus, UserPackage};

/// Convenient domain result alias.
///
/// # Examples
/// ```
/// use gym_backend::domain::{DomainResult, Error};
///
/// fn reject() -> DomainResult<()> {
///     Err(Error::conflict("membership already active"))
/// }
/// assert!(reject().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
