//! Reconciler configuration loaded via OrthoConfig.
//!
//! Values come from `GYM_*` environment variables or a configuration file.
//! Every field is optional; the accessors apply defaults.

use std::env;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::WorkerConfig;
use crate::outbound::persistence::PoolConfig;

const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_POOL_CHECKOUT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(2);
const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";

/// No usable database URL was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseUrlError {
    /// `--database-url` was given but blank.
    #[error("--database-url must not be empty when provided")]
    BlankArgument,
    /// `GYM_DATABASE_URL` was set but blank.
    #[error("GYM_DATABASE_URL must not be empty")]
    BlankSetting,
    /// Nothing was configured.
    #[error("database URL missing: set --database-url, GYM_DATABASE_URL or DATABASE_URL")]
    Missing,
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

/// Settings shared by the event worker and the command binaries.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GYM")]
pub struct ReconcilerSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub pool_max_size: Option<u32>,
    /// Seconds a query waits for a pooled connection.
    pub pool_checkout_timeout_secs: Option<u64>,
    /// Pending booking events before publishers wait.
    pub queue_capacity: Option<usize>,
    /// Dispatch attempts per event, including the first.
    pub max_delivery_attempts: Option<u32>,
    /// First redelivery delay in milliseconds; later delays double.
    pub retry_backoff_ms: Option<u64>,
}

impl ReconcilerSettings {
    /// Configured database URL, if any.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Pick the database URL: an explicit value first, then
    /// `GYM_DATABASE_URL`, then the conventional `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseUrlError`] when every source is unset or blank.
    pub fn resolve_database_url(
        &self,
        explicit: Option<String>,
    ) -> Result<String, DatabaseUrlError> {
        if let Some(value) = explicit {
            return non_blank(value).ok_or(DatabaseUrlError::BlankArgument);
        }
        if let Some(value) = self.database_url.clone() {
            return non_blank(value).ok_or(DatabaseUrlError::BlankSetting);
        }
        env::var(FALLBACK_DATABASE_URL_VAR)
            .ok()
            .and_then(non_blank)
            .ok_or(DatabaseUrlError::Missing)
    }

    /// Pool configuration for `database_url`.
    pub fn pool_config(&self, database_url: &str) -> PoolConfig {
        PoolConfig::new(database_url)
            .with_max_size(self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE))
            .with_checkout_timeout(Duration::from_secs(
                self.pool_checkout_timeout_secs
                    .unwrap_or(DEFAULT_POOL_CHECKOUT_TIMEOUT_SECS),
            ))
    }

    /// Booking event queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    /// Redelivery settings for the booking event worker.
    pub fn worker_config(&self) -> WorkerConfig {
        let initial_backoff = Duration::from_millis(
            self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
        );
        WorkerConfig {
            max_delivery_attempts: self
                .max_delivery_attempts
                .unwrap_or(DEFAULT_MAX_DELIVERY_ATTEMPTS),
            initial_backoff,
            max_backoff: MAX_RETRY_BACKOFF.max(initial_backoff),
        }
    }
}
