//! Periodic sweep for unresolved host errors.
//!
//! This module contains the ReconnectMonitor which handles:
//! - Running a background task that sweeps the error registry every
//!   [`SWEEP_PERIOD`]
//! - Counting streaks older than [`STALE_AFTER`]
//! - Terminating the process when any stale streak is found
//!
//! It catches hosts whose error was recorded once and then never cleared nor
//! re-recorded, e.g. a host that stopped being subscribed to altogether, which
//! [`ErrorWatcher::record_error`] alone would never escalate.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};

use crate::error::{FatalError, Result, SubscriberError};
use crate::watcher::ErrorWatcher;

/// Time between two sweeps
pub const SWEEP_PERIOD: Duration = Duration::from_secs(10);

/// Age beyond which an open streak counts as stale
pub const STALE_AFTER: Duration = Duration::from_secs(20);

/// Background watchdog over an [`ErrorWatcher`]'s registry.
///
/// # Shutdown
///
/// The monitor provides shutdown with a 5-second timeout. It is only needed
/// for orderly exits; fatal trips end the process without it.
pub struct ReconnectMonitor {
    /// Handle to the background sweep task
    background_task: Option<JoinHandle<()>>,
    /// Channel for signaling shutdown
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ReconnectMonitor {
    /// Start the monitor with a background task.
    ///
    /// The first sweep runs one [`SWEEP_PERIOD`] after this call.
    pub fn start(watcher: ErrorWatcher) -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SubscriberError::NoRuntime)?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let background_task = handle.spawn(Self::sweep_task(watcher, shutdown_rx));

        Ok(Self {
            background_task: Some(background_task),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Run one sweep and return the number of stale streaks.
    ///
    /// Invokes the watcher's terminator when the count is non-zero.
    pub fn sweep(watcher: &ErrorWatcher) -> usize {
        let now = Instant::now();
        let stale = watcher
            .snapshot()
            .into_iter()
            .filter(|(_, first_error)| now.saturating_duration_since(*first_error) > STALE_AFTER)
            .count();

        if stale > 0 {
            watcher.terminate(FatalError::StaleHostErrors {
                count: stale,
                threshold: STALE_AFTER,
            });
        } else {
            tracing::trace!("reconnect sweep found no stale errors ({} open)", watcher.len());
        }

        stale
    }

    /// Whether the background task is still running
    pub fn is_running(&self) -> bool {
        self.background_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Shutdown the monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown times out or the task panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        if let Some(task) = self.background_task.take() {
            match timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(SubscriberError::ShutdownError(format!(
                    "Reconnect monitor panicked: {e}"
                ))),
                Err(_) => Err(SubscriberError::ShutdownError(
                    "Reconnect monitor shutdown timed out after 5 seconds".to_string(),
                )),
            }
        } else {
            Ok(())
        }
    }

    async fn sweep_task(watcher: ErrorWatcher, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + SWEEP_PERIOD, SWEEP_PERIOD);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Self::sweep(&watcher);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("reconnect monitor stopped");
                    break;
                }
            }
        }
    }
}

impl Drop for ReconnectMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.background_task.take() {
            task.abort();
        }
    }
}
