//! Self-renewing UPnP event subscription.
//!
//! A [`Subscription`] is a handle to a driver task that owns all mutable
//! subscription state. The driver loops over:
//!
//! 1. issue SUBSCRIBE (initial or renewal, depending on whether a SID is held)
//! 2. on success: clear the host's error streak, wait `interval × 500 ms`
//! 3. on failure: record the error, drop the SID, wait the retry interval
//!
//! The wait in step 2/3 is the subscription's only timer, so a new timer is
//! never armed while another is pending. Disposal (explicit or by dropping the
//! handle) interrupts whichever of the request or the timer is pending and
//! sends a final UNSUBSCRIBE.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use upnp_transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};

use crate::config::SubscriptionConfig;
use crate::error::{FatalError, Result, SubscriberError};
use crate::types::{SubscriptionEvent, SubscriptionState, SubscriptionStatus};
use crate::watcher::ErrorWatcher;

/// Consecutive failures after which the endpoint is considered dead
pub const DEAD_THRESHOLD: u32 = 5;

/// Delay between the dead notification and process termination
pub const DEAD_GRACE: Duration = Duration::from_millis(150);

/// Payload of the [`SubscriptionEvent::Dead`] notification
pub const DEAD_MESSAGE: &str = "Endpoint has probably died";

const EVENT_BUFFER_SIZE: usize = 32;

/// Build the SUBSCRIBE request for the current state.
///
/// With a SID this is a renewal carrying only `TIMEOUT` and `SID`; without
/// one it is an initial subscription carrying `TIMEOUT`, `CALLBACK` and `NT`.
pub fn subscribe_request(config: &SubscriptionConfig, sid: Option<&str>) -> TransportRequest {
    let request = TransportRequest::new(Method::Subscribe, config.subscribe_url.as_str())
        .with_header("TIMEOUT", config.timeout_header());

    match sid {
        Some(sid) => request.with_header("SID", sid),
        None => request
            .with_header("CALLBACK", config.callback_header())
            .with_header("NT", "upnp:event"),
    }
}

/// Build the UNSUBSCRIBE request. The `SID` header is omitted when no SID is held.
pub fn unsubscribe_request(config: &SubscriptionConfig, sid: Option<&str>) -> TransportRequest {
    let request = TransportRequest::new(Method::Unsubscribe, config.subscribe_url.as_str());
    match sid {
        Some(sid) => request.with_header("SID", sid),
        None => request,
    }
}

/// Handle to a running subscription.
///
/// Dropping the handle disposes the subscription.
pub struct Subscription {
    subscribe_url: String,
    status_rx: watch::Receiver<SubscriptionStatus>,
    event_tx: broadcast::Sender<SubscriptionEvent>,
    /// Attached before the driver starts; handed out by the first `events()` call
    first_events: Option<broadcast::Receiver<SubscriptionEvent>>,
    /// Sending on, or dropping, this sender disposes the driver
    dispose_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Validate `config` and start the subscription.
    ///
    /// The first SUBSCRIBE is issued immediately by the spawned driver.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Configuration`] for an invalid config and
    /// [`SubscriberError::NoRuntime`] when called outside a tokio runtime.
    pub fn start(
        config: SubscriptionConfig,
        transport: Arc<dyn Transport>,
        watcher: ErrorWatcher,
    ) -> Result<Self> {
        config.validate()?;
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SubscriberError::NoRuntime)?;

        let (status_tx, status_rx) = watch::channel(SubscriptionStatus::default());
        let (event_tx, first_events) = broadcast::channel(EVENT_BUFFER_SIZE);
        let (dispose_tx, dispose_rx) = oneshot::channel();

        let subscribe_url = config.subscribe_url.clone();
        let driver = Driver {
            config: Arc::new(config),
            transport,
            watcher,
            sid: None,
            consecutive_errors: 0,
            dead: false,
            status_tx,
            event_tx: event_tx.clone(),
        };

        tracing::debug!("starting subscription to {}", subscribe_url);
        let task = handle.spawn(driver.run(dispose_rx));

        Ok(Self {
            subscribe_url,
            status_rx,
            event_tx,
            first_events: Some(first_events),
            dispose_tx,
            task,
        })
    }

    /// The event endpoint this subscription targets
    pub fn subscribe_url(&self) -> &str {
        &self.subscribe_url
    }

    /// Latest published status
    pub fn status(&self) -> SubscriptionStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that is notified on every status change
    pub fn watch_status(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status_rx.clone()
    }

    /// Attach a listener for [`SubscriptionEvent`]s.
    ///
    /// The first call returns a receiver that was attached before the driver
    /// started, so it sees every event. Later listeners only see events
    /// emitted after they are attached.
    pub fn events(&mut self) -> broadcast::Receiver<SubscriptionEvent> {
        self.first_events
            .take()
            .unwrap_or_else(|| self.event_tx.subscribe())
    }

    /// Stop renewing and send a final UNSUBSCRIBE.
    ///
    /// Never blocks and never fails. The returned handle completes once the
    /// UNSUBSCRIBE has been answered or has failed; awaiting it is optional.
    pub fn dispose(self) -> JoinHandle<()> {
        let _ = self.dispose_tx.send(());
        self.task
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subscribe_url", &self.subscribe_url)
            .field("status", &*self.status_rx.borrow())
            .finish()
    }
}

/// Owner of the subscription state, run as a single task.
struct Driver {
    config: Arc<SubscriptionConfig>,
    transport: Arc<dyn Transport>,
    watcher: ErrorWatcher,
    sid: Option<String>,
    consecutive_errors: u32,
    dead: bool,
    status_tx: watch::Sender<SubscriptionStatus>,
    event_tx: broadcast::Sender<SubscriptionEvent>,
}

impl Driver {
    async fn run(mut self, mut dispose_rx: oneshot::Receiver<()>) {
        loop {
            self.publish(SubscriptionState::Subscribing);
            let renewal = self.sid.is_some();
            let request = subscribe_request(&self.config, self.sid.as_deref());

            let outcome = tokio::select! {
                outcome = self.transport.send(request) => outcome,
                _ = &mut dispose_rx => {
                    tracing::debug!(
                        "disposed with SUBSCRIBE to {} in flight, response will be ignored",
                        self.config.subscribe_url
                    );
                    break;
                }
            };

            let delay = match outcome {
                Ok(response) => self.on_success(response, renewal),
                Err(error) => self.on_failure(error),
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut dispose_rx => break,
            }
        }

        self.dispose().await;
    }

    fn on_success(&mut self, response: TransportResponse, renewal: bool) -> Duration {
        self.sid = response.sid().map(str::to_string);
        self.consecutive_errors = 0;
        self.watcher.clear_error(Some(&self.config.subscribe_url));
        // Without a SID there is nothing to renew; the next attempt starts over.
        self.publish(if self.sid.is_some() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Unsubscribed
        });

        let sid = self.sid.clone();
        if renewal {
            tracing::trace!("renewed subscription {:?} on {}", sid, self.config.subscribe_url);
            self.emit(SubscriptionEvent::Renewed { sid });
        } else {
            tracing::debug!("subscribed to {} with sid {:?}", self.config.subscribe_url, sid);
            self.emit(SubscriptionEvent::Subscribed { sid });
        }

        self.config.renewal_delay()
    }

    fn on_failure(&mut self, error: TransportError) -> Duration {
        self.watcher.record_error(Some(&self.config.subscribe_url));
        tracing::warn!(
            "resubscribing to {} failed {} times: {}",
            self.config.subscribe_url,
            self.consecutive_errors,
            error
        );

        self.sid = None;
        self.consecutive_errors += 1;
        self.publish(SubscriptionState::Unsubscribed);
        self.emit(SubscriptionEvent::Failed {
            consecutive_errors: self.consecutive_errors,
            error: error.to_string(),
        });

        if self.consecutive_errors == DEAD_THRESHOLD && !self.dead {
            self.dead = true;
            self.emit(SubscriptionEvent::Dead {
                message: DEAD_MESSAGE.to_string(),
            });
            self.schedule_termination();
        }

        self.config.retry_interval
    }

    fn schedule_termination(&self) {
        let watcher = self.watcher.clone();
        let reason = FatalError::SubscriptionExhausted {
            endpoint: self.config.subscribe_url.clone(),
            failures: self.consecutive_errors,
        };

        tokio::spawn(async move {
            tokio::time::sleep(DEAD_GRACE).await;
            watcher.terminate(reason);
        });
    }

    async fn dispose(mut self) {
        self.publish(SubscriptionState::Disposed);
        let sid = self.sid.take();
        let request = unsubscribe_request(&self.config, sid.as_deref());

        match self.transport.send(request).await {
            Ok(_) => {
                tracing::trace!("successfully unsubscribed from {}", self.config.subscribe_url);
            }
            Err(e) => {
                tracing::error!("unsubscribe from sid {:?} failed: {}", sid, e);
            }
        }
    }

    fn publish(&self, state: SubscriptionState) {
        self.status_tx.send_replace(SubscriptionStatus {
            state,
            sid: self.sid.clone(),
            consecutive_errors: self.consecutive_errors,
        });
    }

    fn emit(&self, event: SubscriptionEvent) {
        // No listeners is fine.
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SubscriptionConfig {
        SubscriptionConfig::new("http://host1/sub", "http://10.0.0.5:3400/notify")
    }

    #[test]
    fn test_initial_subscribe_headers() {
        let request = subscribe_request(&config(), None);

        assert_eq!(request.method, Method::Subscribe);
        assert_eq!(request.target, "http://host1/sub");
        assert_eq!(request.header("TIMEOUT"), Some("Second-600"));
        assert_eq!(request.header("CALLBACK"), Some("<http://10.0.0.5:3400/notify>"));
        assert_eq!(request.header("NT"), Some("upnp:event"));
        assert_eq!(request.header("SID"), None);
    }

    #[test]
    fn test_renewal_headers() {
        let request = subscribe_request(&config().with_subscription_interval(120), Some("uuid-123"));

        assert_eq!(request.header("TIMEOUT"), Some("Second-120"));
        assert_eq!(request.header("SID"), Some("uuid-123"));
        assert_eq!(request.header("CALLBACK"), None);
        assert_eq!(request.header("NT"), None);
        assert_eq!(request.headers.len(), 2);
    }

    #[test]
    fn test_unsubscribe_headers() {
        let request = unsubscribe_request(&config(), Some("uuid-123"));
        assert_eq!(request.method, Method::Unsubscribe);
        assert_eq!(request.header("SID"), Some("uuid-123"));
        assert_eq!(request.headers.len(), 1);

        let request = unsubscribe_request(&config(), None);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        struct Unused;

        #[async_trait::async_trait]
        impl Transport for Unused {
            async fn send(
                &self,
                _request: TransportRequest,
            ) -> std::result::Result<TransportResponse, TransportError> {
                unreachable!("no request is issued for an invalid config")
            }
        }

        let watcher = ErrorWatcher::new(crate::testing::RecordingTerminator::default());
        let result = Subscription::start(
            SubscriptionConfig::new("", "http://10.0.0.5:3400/notify"),
            Arc::new(Unused),
            watcher.clone(),
        );
        assert!(matches!(result, Err(SubscriberError::Configuration(_))));

        let result = Subscription::start(config(), Arc::new(Unused), watcher);
        assert!(matches!(result, Err(SubscriberError::NoRuntime)));
    }
}
