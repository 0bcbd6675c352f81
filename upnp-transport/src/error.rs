//! Error types for the UPnP transport

use thiserror::Error;

use crate::Method;

/// Errors that can occur while issuing a GENA request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network or HTTP communication error
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The device answered with a non-2xx status
    #[error("{method} failed: HTTP {status}")]
    Status {
        /// Method of the rejected request
        method: Method,
        /// HTTP status code returned by the device
        status: u16,
    },

    /// The request could not be built (bad header value, unusable target)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::Network("connection refused".to_string());
        assert_eq!(error.to_string(), "Network/HTTP error: connection refused");

        let error = TransportError::Status {
            method: Method::Subscribe,
            status: 412,
        };
        assert_eq!(error.to_string(), "SUBSCRIBE failed: HTTP 412");

        let error = TransportError::InvalidRequest("bad SID".to_string());
        assert_eq!(error.to_string(), "Invalid request: bad SID");
    }
}
