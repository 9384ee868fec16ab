//! Outbound port for the "sessions nearly used up" signal.
//!
//! Delivery channels (push, email, SMS) live behind this port and are not
//! part of this crate.

use async_trait::async_trait;

use crate::domain::SessionsNearEnd;

use super::define_port_error;

define_port_error! {
    /// Errors raised when handing a signal to the notification dispatcher.
    pub enum SessionNotifierError {
        /// The dispatcher rejected or could not accept the signal.
        Dispatch { message: String } =>
            "session notification dispatch failed: {message}",
    }
}

/// Port for publishing low-balance signals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionNotifier: Send + Sync {
    /// Publish a signal for a package that is about to run out.
    async fn notify_sessions_near_end(
        &self,
        signal: &SessionsNearEnd,
    ) -> Result<(), SessionNotifierError>;
}
