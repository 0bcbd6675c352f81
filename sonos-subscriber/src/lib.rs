//! # sonos-subscriber
//!
//! Long-lived UPnP event subscriptions with a fail-fast watchdog.
//!
//! Each [`Subscription`] subscribes to an event endpoint and keeps renewing
//! it, retrying on failure. All subscriptions of a process report into one
//! shared [`ErrorWatcher`], which correlates failures per host, and a
//! [`ReconnectMonitor`] periodically sweeps that registry. When a host stays
//! sick, or one subscription fails too many times in a row, the process is
//! terminated so that an external supervisor can restart it.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sonos_subscriber::{ErrorWatcher, ReconnectMonitor, Subscription, SubscriptionConfig};
//! use upnp_transport::HttpTransport;
//!
//! let watcher = ErrorWatcher::with_process_exit();
//! let monitor = ReconnectMonitor::start(watcher.clone())?;
//! let transport = Arc::new(HttpTransport::new()?);
//!
//! let subscription = Subscription::start(
//!     SubscriptionConfig::new(
//!         "http://192.168.1.20:1400/MediaRenderer/AVTransport/Event",
//!         "http://192.168.1.50:3400/notify",
//!     ),
//!     transport,
//!     watcher,
//! )?;
//! ```

mod config;
mod error;
pub mod logging;
pub mod monitor;
mod subscription;
mod terminator;
mod types;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use config::*;
pub use error::*;
pub use monitor::ReconnectMonitor;
pub use subscription::*;
pub use terminator::*;
pub use types::*;
pub use watcher::{ErrorVerdict, ErrorWatcher};
