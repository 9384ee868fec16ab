//! PostgreSQL-backed `MemberRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::UserId;
use crate::domain::ports::{MemberRepository, MemberRepositoryError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::pool::DbPool;
use super::schema::users;

/// Diesel-backed member existence checks.
#[derive(Clone)]
pub struct DieselMemberRepository {
    pool: DbPool,
}

impl DieselMemberRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for DieselMemberRepository {
    async fn exists(&self, user_id: UserId) -> Result<bool, MemberRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, MemberRepositoryError::connection))?;
        diesel::select(exists(users::table.filter(users::id.eq(user_id.get()))))
            .get_result(&mut conn)
            .await
            .map_err(|err| {
                map_basic_diesel_error(
                    err,
                    MemberRepositoryError::query,
                    MemberRepositoryError::connection,
                )
            })
    }
}
