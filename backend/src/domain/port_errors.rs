//! Mapping from port errors to domain errors.
//!
//! Connection failures become `service_unavailable` so the event worker
//! redelivers; everything else becomes `internal`.

use super::Error;
use super::ports::{
    AuditLogRepositoryError, BookingRepositoryError, GymClassRepositoryError,
    MemberRepositoryError, UserPackageRepositoryError,
};

pub(crate) fn map_gym_class_error(error: GymClassRepositoryError) -> Error {
    match error {
        GymClassRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("gym class repository unavailable: {message}"))
        }
        GymClassRepositoryError::Query { message } => {
            Error::internal(format!("gym class repository error: {message}"))
        }
    }
}

pub(crate) fn map_booking_error(error: BookingRepositoryError) -> Error {
    match error {
        BookingRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("booking repository unavailable: {message}"))
        }
        BookingRepositoryError::Query { message } => {
            Error::internal(format!("booking repository error: {message}"))
        }
    }
}

pub(crate) fn map_package_error(error: UserPackageRepositoryError) -> Error {
    match error {
        UserPackageRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("user package repository unavailable: {message}"))
        }
        UserPackageRepositoryError::Query { message } => {
            Error::internal(format!("user package repository error: {message}"))
        }
        UserPackageRepositoryError::PackageNotFound { package_id } => {
            Error::not_found(format!("user package {package_id} not found"))
        }
    }
}

pub(crate) fn map_member_error(error: MemberRepositoryError) -> Error {
    match error {
        MemberRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("member repository unavailable: {message}"))
        }
        MemberRepositoryError::Query { message } => {
            Error::internal(format!("member repository error: {message}"))
        }
    }
}

pub(crate) fn map_audit_log_error(error: AuditLogRepositoryError) -> Error {
    match error {
        AuditLogRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("audit log repository unavailable: {message}"))
        }
        AuditLogRepositoryError::Query { message } => {
            Error::internal(format!("audit log repository error: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::{ErrorCode, PackageId};

    #[rstest]
    fn connection_failures_are_service_unavailable() {
        assert_eq!(
            map_booking_error(BookingRepositoryError::connection("refused")).code(),
            ErrorCode::ServiceUnavailable
        );
        assert_eq!(
            map_gym_class_error(GymClassRepositoryError::connection("refused")).code(),
            ErrorCode::ServiceUnavailable
        );
    }

    #[rstest]
    fn query_failures_are_internal() {
        let error = map_member_error(MemberRepositoryError::query("bad sql"));
        assert_eq!(error.code(), ErrorCode::InternalError);
        assert!(error.message().contains("bad sql"));
    }

    #[rstest]
    fn vanished_package_is_not_found() {
        let error = map_package_error(UserPackageRepositoryError::package_not_found(
            PackageId::new(5),
        ));
        assert_eq!(error.code(), ErrorCode::NotFound);
    }
}
