//! Port for checking that a booking's member still exists.

use async_trait::async_trait;

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by member repository adapters.
    pub enum MemberRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "member repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "member repository query failed: {message}",
    }
}

/// Port for member existence checks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Whether a user row with this id exists.
    async fn exists(&self, user_id: UserId) -> Result<bool, MemberRepositoryError>;
}
