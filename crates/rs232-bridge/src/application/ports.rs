//! Ports: the traits the pumps talk to, and the errors they can raise.
//!
//! The pumps never touch a device or socket directly.  They are handed a
//! [`SerialReader`], a [`SerialWriter`], and a [`Transport`] at startup.  In
//! production these are the `infrastructure` adapters; in tests they are
//! recording doubles.
//!
//! # Why split the serial link into a reader and a writer?
//!
//! The uplink pump only reads and the downlink pump only writes.  Giving each
//! pump its own half makes "no two tasks read (or write) the device
//! concurrently" true by construction instead of by convention.

use async_trait::async_trait;
use rs232_core::{CodecError, Envelope};
use thiserror::Error;

use crate::domain::TransportKind;

/// Failures of the Serial Link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The device could not be opened.  Fatal at startup.
    #[error("serial device '{path}' unavailable: {reason}")]
    Unavailable { path: String, reason: String },

    /// A single read, write, or availability query failed.  The pump logs it
    /// and moves on.
    #[error("serial I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a transport send or receive.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be completed (DNS, connect, timeout...).
    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    /// The HTTP server answered with a non-success status.
    #[error("{endpoint} answered HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The socket connection failed at the protocol or I/O level.
    #[error("socket error: {0}")]
    Socket(String),

    /// The remote peer closed the socket connection.
    #[error("socket closed by peer")]
    Closed,

    /// Inbound wire data could not be decoded, or outbound data encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Returns `true` if the session cannot continue after this error.
    ///
    /// Polling failures are per-request and always retried.  A socket channel
    /// cannot be partially recovered, so socket and close errors end the
    /// session and leave restarting to the supervising process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Socket(_) | TransportError::Closed)
    }

    /// Returns `true` if the error is an undecodable inbound batch.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TransportError::Codec(CodecError::Malformed(_)))
    }
}

/// Read side of the Serial Link (owned by the uplink pump).
///
/// The read model is polling: the pump asks how many bytes are waiting and
/// only reads when the answer is non-zero.
#[cfg_attr(test, mockall::automock)]
pub trait SerialReader: Send {
    /// Returns the number of bytes waiting in the driver's input buffer.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the driver query fails.
    fn bytes_available(&mut self) -> Result<usize, LinkError>;

    /// Reads up to `max` bytes.  May return fewer.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the driver read fails.
    fn read(&mut self, max: usize) -> Result<Vec<u8>, LinkError>;
}

/// Write side of the Serial Link (owned by the downlink pump).
#[cfg_attr(test, mockall::automock)]
pub trait SerialWriter: Send {
    /// Writes all of `bytes`, returning the number written.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the bytes could not all be written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError>;
}

/// Duplex contract shared by the polling and socket transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits for the next inbound batch of envelopes.
    ///
    /// Polling: one GET per call.  Socket: the next inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`]; check [`TransportError::is_fatal`] to decide
    /// whether to retry.
    async fn receive(&self) -> Result<Vec<Envelope>, TransportError>;

    /// Sends one batch of envelopes as a single wire message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the batch could not be delivered.
    async fn send(&self, batch: &[Envelope]) -> Result<(), TransportError>;

    /// Which variant this is, for log messages.
    fn kind(&self) -> TransportKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_errors_are_fatal() {
        assert!(TransportError::Closed.is_fatal());
        assert!(TransportError::Socket("reset".into()).is_fatal());
    }

    #[test]
    fn test_polling_errors_are_not_fatal() {
        let request = TransportError::Request {
            endpoint: "http://x".into(),
            reason: "refused".into(),
        };
        let status = TransportError::Status {
            endpoint: "http://x".into(),
            status: 503,
        };
        assert!(!request.is_fatal());
        assert!(!status.is_fatal());
    }

    #[test]
    fn test_malformed_batch_is_recognised_and_not_fatal() {
        let err: TransportError = rs232_core::decode(b"{}").unwrap_err().into();
        assert!(err.is_malformed());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_link_error_wraps_io_error() {
        let err: LinkError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(err.to_string().contains("gone"));
    }
}
