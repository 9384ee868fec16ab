//! PostgreSQL-backed `GymClassRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{GymClassRepository, GymClassRepositoryError};
use crate::domain::{GymClass, GymClassId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{GymClassRow, counter_to_db};
use super::pool::{DbPool, PoolError};
use super::schema::gym_classes;

/// Diesel-backed implementation of the gym class repository port.
#[derive(Clone)]
pub struct DieselGymClassRepository {
    pool: DbPool,
}

impl DieselGymClassRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> GymClassRepositoryError {
    map_basic_pool_error(error, GymClassRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> GymClassRepositoryError {
    map_basic_diesel_error(
        error,
        GymClassRepositoryError::query,
        GymClassRepositoryError::connection,
    )
}

fn to_domain(row: GymClassRow) -> Result<GymClass, GymClassRepositoryError> {
    GymClass::try_from(row).map_err(GymClassRepositoryError::query)
}

#[async_trait]
impl GymClassRepository for DieselGymClassRepository {
    async fn find_by_id(
        &self,
        class_id: GymClassId,
    ) -> Result<Option<GymClass>, GymClassRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = gym_classes::table
            .filter(gym_classes::id.eq(class_id.get()))
            .select(GymClassRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(to_domain).transpose()
    }

    async fn list_all(&self) -> Result<Vec<GymClass>, GymClassRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<GymClassRow> = gym_classes::table
            .order(gym_classes::id.asc())
            .select(GymClassRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(to_domain).collect()
    }

    async fn set_current_participants(
        &self,
        class_id: GymClassId,
        count: u32,
    ) -> Result<(), GymClassRepositoryError> {
        let count = counter_to_db("current_participants", count)
            .map_err(GymClassRepositoryError::query)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(gym_classes::table.filter(gym_classes::id.eq(class_id.get())))
            .set(gym_classes::current_participants.eq(count))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for gym class repository error mapping.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::Exhausted("connection refused".to_owned()));
        assert!(matches!(err, GymClassRepositoryError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn unreadable_status_is_a_query_error() {
        let row = GymClassRow {
            id: 1,
            name: "Yoga".to_owned(),
            max_participants: 10,
            current_participants: 2,
            status: "postponed".to_owned(),
            starts_at: chrono::Utc::now(),
        };
        assert!(matches!(
            to_domain(row),
            Err(GymClassRepositoryError::Query { .. })
        ));
    }
}
