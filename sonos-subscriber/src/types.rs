//! Core types for the sonos-subscriber crate.

use std::fmt;

/// Key used to correlate errors across subscriptions that share a host.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct HostKey(String);

impl HostKey {
    /// Key shared by every subscription with no identifiable host.
    pub const ALL_HOSTS: &'static str = "all-sonos";

    /// Create a host key from a raw string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for an endpoint.
    ///
    /// The key is the third `/`-delimited segment of the endpoint, i.e. the
    /// `host[:port]` part of `http://host:port/path`. Endpoints that are
    /// absent, empty or have no such segment share the [`ALL_HOSTS`] key.
    ///
    /// [`ALL_HOSTS`]: Self::ALL_HOSTS
    pub fn from_endpoint(endpoint: Option<&str>) -> Self {
        endpoint
            .filter(|e| !e.is_empty())
            .and_then(|e| e.split('/').nth(2))
            .filter(|host| !host.is_empty())
            .map(Self::new)
            .unwrap_or_else(Self::all_hosts)
    }

    /// The sentinel key for subscriptions with no identifiable host.
    pub fn all_hosts() -> Self {
        Self(Self::ALL_HOSTS.to_string())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostKey {
    fn from(endpoint: &str) -> Self {
        Self::from_endpoint(Some(endpoint))
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a [`Subscription`](crate::Subscription).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No identifier held; waiting for the first attempt or a retry
    Unsubscribed,
    /// A SUBSCRIBE request is in flight
    Subscribing,
    /// Identifier held, renewal timer armed
    Active,
    /// Disposed; no further requests except the final UNSUBSCRIBE
    Disposed,
}

/// Snapshot of a subscription's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStatus {
    /// Current lifecycle state
    pub state: SubscriptionState,
    /// Identifier granted by the endpoint, if any
    pub sid: Option<String>,
    /// Failures since the last success
    pub consecutive_errors: u32,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            sid: None,
            consecutive_errors: 0,
        }
    }
}

/// Notifications emitted by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// An initial SUBSCRIBE succeeded
    Subscribed {
        /// Identifier granted by the endpoint
        sid: Option<String>,
    },
    /// A renewal SUBSCRIBE succeeded
    Renewed {
        /// Identifier granted by the endpoint
        sid: Option<String>,
    },
    /// A SUBSCRIBE failed and a retry is scheduled
    Failed {
        /// Failures since the last success, including this one
        consecutive_errors: u32,
        /// Description of the transport error
        error: String,
    },
    /// The endpoint is considered dead; the process is about to exit
    Dead {
        /// Human-readable reason
        message: String,
    },
}
