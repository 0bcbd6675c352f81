//! Cross-subscription error correlation.
//!
//! The [`ErrorWatcher`] keeps, per host, the time of the first error of the
//! current unresolved streak. A host that is still failing more than
//! [`SUSTAINED_FAILURE_AFTER`] into its streak trips the circuit breaker and
//! ends the process; a streak older than [`STREAK_RESET_AFTER`] is assumed to
//! have been transient and is restarted instead.
//!
//! One watcher is built per process and cloned into every subscription and
//! the [`ReconnectMonitor`](crate::ReconnectMonitor); clones share the same
//! registry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::FatalError;
use crate::terminator::{ProcessExit, Terminator};
use crate::types::HostKey;

/// A repeat error later than this into a streak is fatal
pub const SUSTAINED_FAILURE_AFTER: Duration = Duration::from_secs(5);

/// A repeat error later than this starts a fresh streak
pub const STREAK_RESET_AFTER: Duration = Duration::from_secs(45);

/// What [`ErrorWatcher::record_error`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorVerdict {
    /// No streak was open for the host; one was started
    FirstError,
    /// The open streak was old enough to be presumed resolved; it was restarted
    StreakReset,
    /// Still inside the grace window; the streak is left untouched
    WithinGrace,
    /// The host kept failing past the grace window; the terminator was invoked
    Sustained {
        /// Time since the first error of the streak
        elapsed: Duration,
    },
}

impl ErrorVerdict {
    /// Whether this verdict tripped the circuit breaker
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorVerdict::Sustained { .. })
    }
}

struct WatcherInner {
    /// Host -> first error of the unresolved streak
    errors: DashMap<HostKey, Instant>,
    terminator: Arc<dyn Terminator>,
}

/// Shared per-host error registry.
#[derive(Clone)]
pub struct ErrorWatcher {
    inner: Arc<WatcherInner>,
}

impl ErrorWatcher {
    /// Create a watcher that reports fatal conditions to `terminator`
    pub fn new(terminator: impl Terminator + 'static) -> Self {
        Self::with_terminator(Arc::new(terminator))
    }

    /// Create a watcher around an already shared terminator
    pub fn with_terminator(terminator: Arc<dyn Terminator>) -> Self {
        tracing::warn!("created error watcher");
        Self {
            inner: Arc::new(WatcherInner {
                errors: DashMap::new(),
                terminator,
            }),
        }
    }

    /// Create a watcher that exits the process on fatal conditions
    pub fn with_process_exit() -> Self {
        Self::new(ProcessExit::new())
    }

    /// Record a failed request against `endpoint`.
    ///
    /// Terminates through the configured [`Terminator`] when the host has
    /// been failing for longer than [`SUSTAINED_FAILURE_AFTER`] but not
    /// longer than [`STREAK_RESET_AFTER`].
    pub fn record_error(&self, endpoint: Option<&str>) -> ErrorVerdict {
        let host = HostKey::from_endpoint(endpoint);
        let now = Instant::now();

        let verdict = match self.inner.errors.entry(host.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(now);
                ErrorVerdict::FirstError
            }
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed > STREAK_RESET_AFTER {
                    entry.insert(now);
                    ErrorVerdict::StreakReset
                } else if elapsed > SUSTAINED_FAILURE_AFTER {
                    ErrorVerdict::Sustained { elapsed }
                } else {
                    ErrorVerdict::WithinGrace
                }
            }
        };

        match verdict {
            ErrorVerdict::FirstError => {
                tracing::warn!("recording new error on {}", host);
            }
            ErrorVerdict::StreakReset => {
                tracing::warn!("old error for {} has been replaced with new one", host);
            }
            ErrorVerdict::WithinGrace => {
                tracing::debug!("repeat error on {} within grace window", host);
            }
            ErrorVerdict::Sustained { elapsed } => {
                self.terminate(FatalError::SustainedHostFailure { host, elapsed });
            }
        }

        verdict
    }

    /// Close the error streak for `endpoint`'s host. Returns whether one was open.
    pub fn clear_error(&self, endpoint: Option<&str>) -> bool {
        let host = HostKey::from_endpoint(endpoint);
        let cleared = self.inner.errors.remove(&host).is_some();
        if cleared {
            tracing::warn!("clearing error for `{}`", host);
        }
        cleared
    }

    /// Start of the open streak for `endpoint`'s host, if any
    pub fn first_error_at(&self, endpoint: Option<&str>) -> Option<Instant> {
        let host = HostKey::from_endpoint(endpoint);
        self.inner.errors.get(&host).map(|entry| *entry.value())
    }

    /// Copy of every open streak
    pub fn snapshot(&self) -> Vec<(HostKey, Instant)> {
        self.inner
            .errors
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Number of hosts with an open streak
    pub fn len(&self) -> usize {
        self.inner.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.errors.is_empty()
    }

    /// Hand a fatal condition to the terminator, logging it first
    pub(crate) fn terminate(&self, reason: FatalError) {
        tracing::error!("{}", reason);
        self.inner.terminator.terminate(&reason);
    }
}

impl std::fmt::Debug for ErrorWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorWatcher")
            .field("open_streaks", &self.len())
            .finish()
    }
}
