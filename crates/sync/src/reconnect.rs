//! Bounded exponential-backoff reconnection.
//!
//! When the realtime channel drops for a transient reason, the session
//! calls [`reconnect_loop`] to retry with increasing delays, up to a
//! fixed attempt ceiling. An auth rejection aborts immediately -- the
//! same credential is never retried -- and triggering the
//! [`CancellationToken`] stops the loop at any point.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectError, Connection, Connector, Credential};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Attempt ceiling; exceeding it surfaces a terminal disconnect.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// How a reconnection round ended.
pub enum ReconnectOutcome {
    /// A connection was re-established.
    Reconnected(Connection),
    /// The credential was rejected; do not retry with it.
    AuthRejected,
    /// The attempt ceiling was exhausted.
    GaveUp,
    /// The cancellation token fired.
    Cancelled,
}

/// Calculate the next backoff delay, clamped to
/// [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Retry the connection with exponential backoff, up to the ceiling.
pub async fn reconnect_loop(
    connector: &Connector,
    credential: &Credential,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> ReconnectOutcome {
    let mut delay = config.initial_delay;

    for attempt in 1..=config.max_attempts {
        // Wait before the attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }

        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to realtime endpoint",
        );

        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            result = connector.connect(credential) => {
                match result {
                    Ok(conn) => {
                        tracing::info!(attempt, "Reconnected to realtime endpoint");
                        return ReconnectOutcome::Reconnected(conn);
                    }
                    Err(ConnectError::AuthRejected { status }) => {
                        tracing::warn!(status, "Credential rejected during reconnect");
                        return ReconnectOutcome::AuthRejected;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                    }
                }
            }
        }

        delay = next_delay(delay, config);
    }

    tracing::warn!(
        attempts = config.max_attempts,
        "Reconnect attempt ceiling exhausted",
    );
    ReconnectOutcome::GaveUp
}
