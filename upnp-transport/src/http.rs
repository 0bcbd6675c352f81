//! `reqwest`-backed transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{Transport, TransportError, TransportRequest, TransportResponse};

/// A minimal HTTP client for UPnP event endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with default timeouts (5s connect, 10s per request)
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    /// Create a transport with explicit timeouts
    pub fn with_timeouts(connect: Duration, request: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    fn header_map(request: &TransportRequest) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let headers = Self::header_map(&request)?;

        tracing::trace!("{} {}", request.method, request.target);

        let response = self
            .client
            .request(method, &request.target)
            .headers(headers)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                method: request.method,
                status: status.as_u16(),
            });
        }

        // Body is never read: GENA answers carry everything in headers.
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect::<Vec<_>>();

        Ok(TransportResponse::new(status.as_u16(), headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[tokio::test]
    async fn test_subscribe_returns_sid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("SUBSCRIBE", "/MediaRenderer/AVTransport/Event")
            .match_header("nt", "upnp:event")
            .match_header("callback", "<http://10.0.0.5:3400/notify>")
            .match_header("timeout", "Second-600")
            .with_status(200)
            .with_header("SID", "uuid:RINCON_000E58A0123401400_sub0000000001")
            .with_header("TIMEOUT", "Second-600")
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest::new(
            Method::Subscribe,
            format!("{}/MediaRenderer/AVTransport/Event", server.url()),
        )
        .with_header("TIMEOUT", "Second-600")
        .with_header("CALLBACK", "<http://10.0.0.5:3400/notify>")
        .with_header("NT", "upnp:event");

        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(
            response.sid(),
            Some("uuid:RINCON_000E58A0123401400_sub0000000001")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("SUBSCRIBE", "/Event")
            .with_status(412)
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest::new(Method::Subscribe, format!("{}/Event", server.url()))
            .with_header("SID", "uuid:expired");

        let error = transport.send(request).await.unwrap_err();
        assert_eq!(
            error,
            TransportError::Status {
                method: Method::Subscribe,
                status: 412,
            }
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_sends_sid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("UNSUBSCRIBE", "/Event")
            .match_header("sid", "uuid:123")
            .with_status(200)
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest::new(Method::Unsubscribe, format!("{}/Event", server.url()))
            .with_header("SID", "uuid:123");

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.sid(), None);
        mock.assert_async().await;
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let request = TransportRequest::new(Method::Subscribe, "http://10.0.0.2:1400/Event")
            .with_header("SID", "bad\nvalue");

        match HttpTransport::header_map(&request) {
            Err(TransportError::InvalidRequest(msg)) => assert!(msg.contains("SID")),
            other => panic!("Expected InvalidRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_header_name_reported_as_sent() {
        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest::new(Method::Subscribe, "http://10.0.0.2:1400/Event")
            .with_header("Bad Name", "Second-600");

        match transport.send(request).await {
            Err(TransportError::InvalidRequest(msg)) => {
                assert!(msg.starts_with("header Bad Name:"), "unexpected message: {msg}")
            }
            other => panic!("Expected InvalidRequest, got {other:?}"),
        }
    }
}
