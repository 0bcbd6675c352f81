//! Private GENA transport for UPnP event subscriptions
//!
//! This crate provides the single capability the subscription engine needs
//! from the network: send a `SUBSCRIBE` or `UNSUBSCRIBE` request to an event
//! endpoint and get back the response headers, or an error. The
//! [`Transport`] trait is the seam; [`HttpTransport`] is the real
//! implementation on top of `reqwest`.

mod error;
mod http;

pub use error::TransportError;
pub use http::HttpTransport;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// GENA request methods used by the subscription engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Create or renew a subscription
    Subscribe,
    /// Cancel a subscription
    Unsubscribe,
}

impl Method {
    /// The HTTP method token sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the response body should be treated.
///
/// Event endpoints answer with headers only, so the body is never buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    #[default]
    Stream,
}

/// A single request against an event endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// SUBSCRIBE or UNSUBSCRIBE
    pub method: Method,
    /// Full URL of the event endpoint
    pub target: String,
    /// Request headers, keyed by their wire name
    pub headers: BTreeMap<String, String>,
    /// Body handling
    pub kind: RequestKind,
}

impl TransportRequest {
    /// Create a request with no headers
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: BTreeMap::new(),
            kind: RequestKind::Stream,
        }
    }

    /// Add a header, replacing any previous value under the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Look up a header by name, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response to a successful (2xx) request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers with lowercase names
    headers: HashMap<String, String>,
}

impl TransportResponse {
    /// Build a response; header names are normalized to lowercase
    pub fn new<I, K, V>(status: u16, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Look up a header by name, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Subscription identifier granted by the device, if any
    pub fn sid(&self) -> Option<&str> {
        self.header("sid").filter(|sid| !sid.is_empty())
    }
}

/// Capability to issue GENA requests.
///
/// Implementations resolve with the response headers on a 2xx answer and
/// reject with a [`TransportError`] on anything else (network failure,
/// non-2xx status, timeout).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its outcome
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
