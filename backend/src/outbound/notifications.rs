//! Default `SessionNotifier` adapter.
//!
//! Delivery channels are outside this crate. The adapter emits each signal as
//! a structured `tracing` event on the `gym_backend::notifications` target,
//! which a log shipper or sidecar can route to push, e-mail, or SMS.

use async_trait::async_trait;
use tracing::info;

use crate::domain::SessionsNearEnd;
use crate::domain::ports::{SessionNotifier, SessionNotifierError};

/// Log target carrying outbound notification signals.
pub const NOTIFICATION_TARGET: &str = "gym_backend::notifications";

/// Notifier that publishes signals as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSessionNotifier;

#[async_trait]
impl SessionNotifier for TracingSessionNotifier {
    async fn notify_sessions_near_end(
        &self,
        signal: &SessionsNearEnd,
    ) -> Result<(), SessionNotifierError> {
        info!(
            target: NOTIFICATION_TARGET,
            kind = "sessions_near_end",
            user_id = %signal.user_id,
            package_id = %signal.package_id,
            remaining_sessions = signal.remaining_sessions,
            is_last_session = signal.is_last_session,
            "sessions near end"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::{PackageId, UserId};

    #[rstest]
    #[tokio::test]
    async fn accepts_every_signal() {
        let signal = SessionsNearEnd::for_balance(UserId::new(1), PackageId::new(2), 1)
            .expect("balance of one warrants a signal");
        TracingSessionNotifier
            .notify_sessions_near_end(&signal)
            .await
            .expect("logging never fails");
    }
}
