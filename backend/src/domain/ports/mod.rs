//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod audit_log_repository;
mod booking_repository;
mod gym_class_repository;
mod member_repository;
mod session_notifier;
mod user_package_repository;

#[cfg(test)]
pub use audit_log_repository::MockAuditLogRepository;
pub use audit_log_repository::{AuditLogEntry, AuditLogRepository, AuditLogRepositoryError};
#[cfg(test)]
pub use booking_repository::MockBookingRepository;
pub use booking_repository::{
    BookingRepository, BookingRepositoryError, MissingReference, OrphanedBooking,
};
#[cfg(test)]
pub use gym_class_repository::MockGymClassRepository;
pub use gym_class_repository::{GymClassRepository, GymClassRepositoryError};
#[cfg(test)]
pub use member_repository::MockMemberRepository;
pub use member_repository::{MemberRepository, MemberRepositoryError};
#[cfg(test)]
pub use session_notifier::MockSessionNotifier;
pub use session_notifier::{SessionNotifier, SessionNotifierError};
#[cfg(test)]
pub use user_package_repository::MockUserPackageRepository;
pub use user_package_repository::{
    LedgerAdjustment, LedgerEntryKind, LedgerReceipt, UserPackageRepository,
    UserPackageRepositoryError,
};
