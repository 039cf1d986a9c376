//! Infrastructure layer for rs232-bridge.
//!
//! The infrastructure layer handles all I/O: the serial device and the two
//! network transports.
//!
//! # Responsibilities
//!
//! - Opening the serial device with fixed 8N1 framing
//! - Splitting it into a reader (uplink) and a writer (downlink)
//! - HTTP polling (GET downlink, POST uplink)
//! - WebSocket connection management
//! - Selecting the transport variant from configuration

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::application::ports::{Transport, TransportError};
use crate::domain::{BridgeConfig, TransportKind};

pub mod http_transport;
pub mod serial_link;
pub mod ws_transport;

pub use http_transport::HttpTransport;
pub use serial_link::{SerialLink, SerialLinkReader, SerialLinkWriter};
pub use ws_transport::WsTransport;

/// Builds the transport selected by `config.transport`.
///
/// # Errors
///
/// See [`connect`].
pub async fn connect_transport(config: &BridgeConfig) -> Result<Arc<dyn Transport>, TransportError> {
    connect(
        config.transport,
        &config.endpoint,
        config.poll_interval,
        config.request_timeout,
    )
    .await
}

/// Builds a transport of `kind` for `endpoint`.
///
/// The polling transport needs no connection up front; the socket transport
/// connects here so a dead endpoint fails startup.  `poll_interval` and
/// `request_timeout` only apply to the polling transport.
///
/// # Errors
///
/// Returns [`TransportError`] if the HTTP client cannot be built or the
/// WebSocket connection cannot be established.
pub async fn connect(
    kind: TransportKind,
    endpoint: &Url,
    poll_interval: Duration,
    request_timeout: Option<Duration>,
) -> Result<Arc<dyn Transport>, TransportError> {
    info!("using {kind} transport at {endpoint}");

    match kind {
        TransportKind::Http => Ok(Arc::new(HttpTransport::new(
            endpoint.clone(),
            poll_interval,
            request_timeout,
        )?)),
        TransportKind::Socket => Ok(Arc::new(WsTransport::connect(endpoint.clone()).await?)),
    }
}
