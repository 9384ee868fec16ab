//! PostgreSQL-backed `AuditLogRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{AuditLogEntry, AuditLogRepository, AuditLogRepositoryError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewAuditLogRow;
use super::pool::DbPool;
use super::schema::audit_logs;

/// Diesel-backed audit log sink.
#[derive(Clone)]
pub struct DieselAuditLogRepository {
    pool: DbPool,
}

impl DieselAuditLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for DieselAuditLogRepository {
    async fn record(&self, entry: &AuditLogEntry) -> Result<(), AuditLogRepositoryError> {
        let issues_found = i32::try_from(entry.issues_found).map_err(|_| {
            AuditLogRepositoryError::query(format!(
                "issue count {} exceeds INTEGER",
                entry.issues_found
            ))
        })?;
        let row = NewAuditLogRow {
            action: entry.action.as_str(),
            issues_found,
            fixed: entry.fixed,
            details: &entry.details,
            created_at: entry.recorded_at,
        };

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, AuditLogRepositoryError::connection))?;
        diesel::insert_into(audit_logs::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(|err| {
                map_basic_diesel_error(
                    err,
                    AuditLogRepositoryError::query,
                    AuditLogRepositoryError::connection,
                )
            })?;
        Ok(())
    }
}
