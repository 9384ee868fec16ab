//! Port for reading classes and writing their cached participant count.

use async_trait::async_trait;

use crate::domain::{GymClass, GymClassId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by gym class repository adapters.
    pub enum GymClassRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "gym class repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "gym class repository query failed: {message}",
    }
}

/// Port for class lookups and participant count writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GymClassRepository: Send + Sync {
    /// Find a class by id.
    async fn find_by_id(
        &self,
        class_id: GymClassId,
    ) -> Result<Option<GymClass>, GymClassRepositoryError>;

    /// Load every class, ordered by id.
    async fn list_all(&self) -> Result<Vec<GymClass>, GymClassRepositoryError>;

    /// Overwrite the cached participant count of a class.
    async fn set_current_participants(
        &self,
        class_id: GymClassId,
        count: u32,
    ) -> Result<(), GymClassRepositoryError>;
}
