//! Port for the structured administrative audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::define_port_error;

define_port_error! {
    /// Errors raised by audit log adapters.
    pub enum AuditLogRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "audit log repository connection failed: {message}",
        /// Insert failed during execution.
        Query { message: String } =>
            "audit log repository query failed: {message}",
    }
}

/// One structured audit log record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    /// Machine-readable action name, e.g. `consistency_check`.
    pub action: String,
    /// Total findings across categories.
    pub issues_found: usize,
    /// Whether the run applied fixes.
    pub fixed: bool,
    /// Per-category counts and any extra context.
    pub details: Value,
    /// When the entry was produced.
    pub recorded_at: DateTime<Utc>,
}

/// Port for appending audit log entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Append an entry.
    async fn record(&self, entry: &AuditLogEntry) -> Result<(), AuditLogRepositoryError>;
}
