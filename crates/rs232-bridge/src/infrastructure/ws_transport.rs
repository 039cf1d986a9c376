//! Socket transport over a WebSocket connection.
//!
//! One long-lived connection carries envelope arrays in both directions: each
//! WebSocket message is one encoded batch.  The stream is split so the
//! downlink pump (reading) and the uplink pump (writing) never wait on each
//! other; each half sits behind its own `tokio::sync::Mutex`.
//!
//! A broken or closed connection cannot be partially recovered, so those
//! errors are fatal to the session (see [`TransportError::is_fatal`]).

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rs232_core::{decode, encode, Envelope};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::application::ports::{Transport, TransportError};
use crate::domain::TransportKind;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket implementation of [`Transport`].
pub struct WsTransport {
    endpoint: Url,
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WsTransport {
    /// Connects to `endpoint` and completes the WebSocket handshake.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Socket`] if the TCP connection or the
    /// handshake fails.
    pub async fn connect(endpoint: Url) -> Result<Self, TransportError> {
        let (ws, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::Socket(format!("connect to {endpoint} failed: {e}")))?;

        info!("socket transport connected to {endpoint}");

        let (sink, stream) = ws.split();
        Ok(Self {
            endpoint,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn receive(&self) -> Result<Vec<Envelope>, TransportError> {
        let mut stream = self.stream.lock().await;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(TransportError::Socket(e.to_string())),
                None => return Err(TransportError::Closed),
            };

            match message {
                WsMessage::Text(text) => {
                    debug!("socket message: {text}");
                    return Ok(decode(text.as_bytes())?);
                }
                WsMessage::Binary(bytes) => return Ok(decode(&bytes)?),
                WsMessage::Close(frame) => {
                    debug!("socket close frame: {frame:?}");
                    return Err(TransportError::Closed);
                }
                // Ping replies are queued by tungstenite itself.
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }

    async fn send(&self, batch: &[Envelope]) -> Result<(), TransportError> {
        let body = encode(batch)?;
        // serde_json output is always UTF-8.
        let text = String::from_utf8_lossy(&body).into_owned();

        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }
}
