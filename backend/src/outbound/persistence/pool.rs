//! `bb8` pool of `diesel-async` PostgreSQL connections.
//!
//! The checkout timeout is the only cancellation the reconcilers rely on: a
//! listener that cannot get a connection in time fails with a connection
//! error and the event worker redelivers.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};

/// Pool failures. Adapters report both as their port's `Connection` error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The first connections could not be opened.
    #[error("database unreachable: {0}")]
    Unreachable(String),
    /// Every connection stayed busy past the checkout timeout.
    #[error("no database connection free: {0}")]
    Exhausted(String),
}

/// Pool sizing and checkout timeout for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connection string.
    pub database_url: String,
    /// Upper bound on open connections; at least one.
    pub max_size: u32,
    /// How long a checkout waits for a free connection.
    pub checkout_timeout: Duration,
}

impl PoolConfig {
    /// Ten connections and a 30 second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: 10,
            checkout_timeout: Duration::from_secs(30),
        }
    }

    /// Cap the pool at `max_size` connections, never fewer than one.
    #[must_use]
    pub fn with_max_size(self, max_size: u32) -> Self {
        Self {
            max_size: max_size.max(1),
            ..self
        }
    }

    /// Wait at most `timeout` for a connection.
    #[must_use]
    pub fn with_checkout_timeout(self, timeout: Duration) -> Self {
        Self {
            checkout_timeout: timeout,
            ..self
        }
    }
}

/// Shared handle to the connection pool; clones share the same pool.
#[derive(Clone)]
pub struct DbPool(Pool<AsyncPgConnection>);

impl DbPool {
    /// Open the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Unreachable`] when the database refuses the
    /// initial connections.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let PoolConfig {
            database_url,
            max_size,
            checkout_timeout,
        } = config;
        Pool::builder()
            .max_size(max_size)
            .connection_timeout(checkout_timeout)
            .build(AsyncDieselConnectionManager::new(database_url))
            .await
            .map(Self)
            .map_err(|err| PoolError::Unreachable(err.to_string()))
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] when the checkout timeout elapses.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.0
            .get()
            .await
            .map_err(|err| PoolError::Exhausted(err.to_string()))
    }
}
