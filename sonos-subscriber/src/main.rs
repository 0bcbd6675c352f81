//! Keeps UPnP event subscriptions alive until interrupted.
//!
//! Any fatal condition (a host failing past its grace window, a stale host
//! error, an exhausted subscription) exits with status 1; run this under a
//! supervisor that restarts it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use sonos_subscriber::logging::init_logging_from_env;
use sonos_subscriber::{
    ErrorWatcher, ReconnectMonitor, Subscription, SubscriptionConfig, SubscriptionEvent,
    DEFAULT_SUBSCRIPTION_INTERVAL_SECS,
};
use upnp_transport::HttpTransport;

/// How long Ctrl-C waits for the final UNSUBSCRIBE requests
const UNSUBSCRIBE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "sonos-subscriber", version, about)]
struct Cli {
    /// Event endpoints to subscribe to, e.g. http://192.168.1.20:1400/MediaRenderer/AVTransport/Event
    #[arg(required = true)]
    endpoints: Vec<String>,

    /// URL the devices should deliver NOTIFY requests to
    #[arg(long, env = "SUBSCRIBER_NOTIFICATION_URL")]
    notification_url: String,

    /// Subscription lifetime requested from the devices, in seconds
    #[arg(long, default_value_t = DEFAULT_SUBSCRIPTION_INTERVAL_SECS)]
    subscription_interval: u32,

    /// Delay before retrying a failed subscribe, in milliseconds
    #[arg(long, default_value_t = 5000)]
    retry_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging_from_env().context("failed to initialize logging")?;

    let watcher = ErrorWatcher::with_process_exit();
    let monitor = ReconnectMonitor::start(watcher.clone())?;
    let transport = Arc::new(HttpTransport::new().context("failed to build HTTP client")?);

    let mut subscriptions = Vec::with_capacity(cli.endpoints.len());
    for endpoint in &cli.endpoints {
        let config = SubscriptionConfig::new(endpoint.as_str(), cli.notification_url.as_str())
            .with_subscription_interval(cli.subscription_interval)
            .with_retry_interval(Duration::from_millis(cli.retry_interval_ms));

        let mut subscription = Subscription::start(config, transport.clone(), watcher.clone())
            .with_context(|| format!("failed to start subscription to {endpoint}"))?;
        tokio::spawn(log_events(endpoint.clone(), subscription.events()));
        subscriptions.push(subscription);
    }

    tracing::info!("subscribed to {} endpoint(s)", subscriptions.len());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");

    let pending: Vec<_> = subscriptions.into_iter().map(Subscription::dispose).collect();
    for handle in pending {
        if tokio::time::timeout(UNSUBSCRIBE_WAIT, handle).await.is_err() {
            tracing::warn!("gave up waiting for unsubscribe after {:?}", UNSUBSCRIBE_WAIT);
        }
    }

    monitor.shutdown().await?;
    Ok(())
}

async fn log_events(
    endpoint: String,
    mut events: tokio::sync::broadcast::Receiver<SubscriptionEvent>,
) {
    loop {
        match events.recv().await {
            Ok(SubscriptionEvent::Subscribed { sid }) => {
                tracing::info!("subscribed to {} ({:?})", endpoint, sid);
            }
            Ok(SubscriptionEvent::Renewed { sid }) => {
                tracing::debug!("renewed {} ({:?})", endpoint, sid);
            }
            Ok(SubscriptionEvent::Failed {
                consecutive_errors,
                error,
            }) => {
                tracing::debug!("{} failed ({} in a row): {}", endpoint, consecutive_errors, error);
            }
            Ok(SubscriptionEvent::Dead { message }) => {
                tracing::error!("{}: {}", endpoint, message);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("dropped {} events for {}", skipped, endpoint);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
