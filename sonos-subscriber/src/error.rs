//! Error types for the sonos-subscriber crate.

use std::time::Duration;

use crate::types::HostKey;

/// Errors returned to callers of the subscriber API.
///
/// Request failures against an endpoint are never reported here: they are
/// retried internally and surface as log lines, error-watcher recordings and
/// [`SubscriptionEvent::Failed`](crate::SubscriptionEvent::Failed) events.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A subscription or monitor was started outside of a tokio runtime
    #[error("No tokio runtime is available to drive the subscription")]
    NoRuntime,

    /// The reconnect monitor could not be stopped cleanly
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

/// Conditions that end the process.
///
/// Every variant is a deliberate circuit-breaker trip: the process is
/// expected to be restarted by an external supervisor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    /// The same host kept failing past the grace window
    #[error("had errors for {elapsed:?} on {host}, going away now")]
    SustainedHostFailure {
        /// Host that kept failing
        host: HostKey,
        /// Time since the first error of the streak
        elapsed: Duration,
    },

    /// Unresolved host errors outlived the staleness threshold
    #[error("had {count} unresolved host error(s) older than {threshold:?}, going away now")]
    StaleHostErrors {
        /// Number of stale entries found in one sweep
        count: usize,
        /// Age beyond which an entry counts as stale
        threshold: Duration,
    },

    /// One subscription ran out of consecutive attempts
    #[error("subscribe to {endpoint} failed {failures} times in a row, exiting process")]
    SubscriptionExhausted {
        /// Subscribe endpoint of the exhausted subscription
        endpoint: String,
        /// Consecutive failures at the time of the trip
        failures: u32,
    },
}

/// Convenience type alias for Results using SubscriberError.
pub type Result<T> = std::result::Result<T, SubscriberError>;
