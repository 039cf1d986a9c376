//! Polling transport over HTTP.
//!
//! - `receive` performs one `GET <endpoint>`; the body is an envelope array of
//!   downlink commands (`[]` when the peer has nothing queued).
//! - `send` performs one `POST <endpoint>` whose body is the encoded batch.
//!   The response body is logged, not parsed.
//!
//! Each request is independent; there is no session beyond the endpoint URL.
//! Every failure is per-request and non-fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use rs232_core::{decode, encode, Envelope};
use tracing::debug;
use url::Url;

use crate::application::ports::{Transport, TransportError};
use crate::domain::TransportKind;

/// HTTP polling implementation of [`Transport`].
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    poll_interval: Duration,
    polled: AtomicBool,
}

impl HttpTransport {
    /// Builds the HTTP client.
    ///
    /// `poll_interval` is slept before every GET except the first;
    /// `request_timeout` bounds each request when set.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the client cannot be built (for
    /// example, the TLS backend fails to initialise).
    pub fn new(
        endpoint: Url,
        poll_interval: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| TransportError::Request {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            endpoint,
            poll_interval,
            polled: AtomicBool::new(false),
        })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_error(&self, e: reqwest::Error) -> TransportError {
        TransportError::Request {
            endpoint: self.endpoint.to_string(),
            reason: e.to_string(),
        }
    }

    fn check_status(&self, response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportError::Status {
                endpoint: self.endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn receive(&self) -> Result<Vec<Envelope>, TransportError> {
        if self.polled.swap(true, Ordering::Relaxed) && !self.poll_interval.is_zero() {
            tokio::time::sleep(self.poll_interval).await;
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let body = self
            .check_status(response)?
            .bytes()
            .await
            .map_err(|e| self.request_error(e))?;

        debug!(
            "GET {}: {}",
            self.endpoint,
            String::from_utf8_lossy(&body)
        );

        Ok(decode(&body)?)
    }

    async fn send(&self, batch: &[Envelope]) -> Result<(), TransportError> {
        let body = encode(batch)?;
        debug!("POST {}: {}", self.endpoint, String::from_utf8_lossy(&body));

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let reply = self
            .check_status(response)?
            .text()
            .await
            .map_err(|e| self.request_error(e))?;

        debug!("POST {} answered: {reply}", self.endpoint);
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_endpoint() {
        let endpoint = Url::parse("http://127.0.0.1:3000/v01/rs232/80").unwrap();
        let transport = HttpTransport::new(endpoint.clone(), Duration::ZERO, None).unwrap();
        assert_eq!(transport.endpoint(), &endpoint);
        assert_eq!(transport.kind(), TransportKind::Http);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_retryable_request_error() {
        // Arrange – port 9 (discard) on loopback is closed on test machines
        let endpoint = Url::parse("http://127.0.0.1:9/").unwrap();
        let transport =
            HttpTransport::new(endpoint, Duration::ZERO, Some(Duration::from_secs(2))).unwrap();

        // Act
        let err = transport.receive().await.unwrap_err();

        // Assert
        assert!(matches!(err, TransportError::Request { .. }));
        assert!(!err.is_fatal());
    }
}
