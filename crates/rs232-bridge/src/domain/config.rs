//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup (from CLI arguments in `main.rs`, or from
//! [`Default`] in tests) and passed by value into the infrastructure layer.
//! There are no process-wide variables holding the device path or endpoint.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Errors raised while assembling or validating a configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// `--transport` was not one of the supported names.
    #[error("unknown transport '{0}' (expected 'http' or 'socket')")]
    UnknownTransport(String),

    /// The endpoint string could not be parsed as a URL.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The endpoint scheme does not match the selected transport.
    #[error("endpoint scheme '{scheme}' cannot be used with the {transport} transport")]
    SchemeMismatch {
        scheme: String,
        transport: TransportKind,
    },
}

/// Which transport variant carries envelopes to and from the remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Periodic HTTP GET for downlink commands, HTTP POST for uplink data.
    Http,
    /// One long-lived WebSocket connection, symmetric in both directions.
    Socket,
}

impl TransportKind {
    /// Returns `true` if an endpoint with `scheme` can be used with this
    /// transport.
    pub fn accepts_scheme(self, scheme: &str) -> bool {
        match self {
            TransportKind::Http => matches!(scheme, "http" | "https"),
            TransportKind::Socket => matches!(scheme, "ws" | "wss"),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("http"),
            TransportKind::Socket => f.write_str("socket"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "polling" => Ok(TransportKind::Http),
            "socket" | "ws" | "websocket" => Ok(TransportKind::Socket),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

/// Serial line parameters.
///
/// Framing is fixed at 8 data bits, no parity, 1 stop bit, no flow control,
/// full duplex.  Only the bit rate and the driver read timeout are carried
/// here; the infrastructure layer applies the fixed framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// How long a driver `read` may block when no byte is ready.
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use rs232_bridge::domain::{BridgeConfig, TransportKind};
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.transport, TransportKind::Http);
/// assert_eq!(cfg.serial.baud_rate, 115_200);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Device node of the serial port, e.g. `/dev/ttyS1`.
    pub serial_path: String,

    /// Serial line parameters.
    pub serial: SerialSettings,

    /// Selected transport variant.
    pub transport: TransportKind,

    /// Remote endpoint: an `http(s)://` URL for polling, `ws(s)://` for socket.
    pub endpoint: Url,

    /// Pause taken by the uplink pump when the serial line has no input.
    ///
    /// Zero means "yield to the scheduler and re-check immediately".
    pub serial_idle: Duration,

    /// Pause between consecutive downlink GETs of the polling transport.
    ///
    /// Zero means "poll back-to-back".
    pub poll_interval: Duration,

    /// Per-request timeout for the polling transport.  `None` means no
    /// timeout.
    pub request_timeout: Option<Duration>,
}

impl BridgeConfig {
    /// Checks that the endpoint scheme suits the selected transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemeMismatch`] when, for example, a `ws://`
    /// endpoint is paired with the HTTP transport.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self.endpoint.scheme();
        if self.transport.accepts_scheme(scheme) {
            Ok(())
        } else {
            Err(ConfigError::SchemeMismatch {
                scheme: scheme.to_string(),
                transport: self.transport,
            })
        }
    }
}

/// Parses an endpoint string into a [`Url`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEndpoint`] if the string is not a valid
/// absolute URL.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

impl Default for BridgeConfig {
    /// | Field            | Default                              |
    /// |------------------|--------------------------------------|
    /// | serial_path      | `/dev/ttyS1`                         |
    /// | transport        | `http`                               |
    /// | endpoint         | `http://127.0.0.1:3000/v01/rs232/80` |
    /// | serial_idle      | 1 ms                                 |
    /// | poll_interval    | 100 ms                               |
    /// | request_timeout  | none                                 |
    fn default() -> Self {
        Self {
            serial_path: "/dev/ttyS1".to_string(),
            serial: SerialSettings::default(),
            transport: TransportKind::Http,
            // The `.unwrap()` here is safe: the string is a compile-time
            // constant that is a valid URL.
            endpoint: Url::parse("http://127.0.0.1:3000/v01/rs232/80").unwrap(),
            serial_idle: Duration::from_millis(1),
            poll_interval: Duration::from_millis(100),
            request_timeout: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_serial_settings_are_115200() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.serial.baud_rate, 115_200);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(BridgeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_transport_kind_parses_aliases() {
        assert_eq!("http".parse::<TransportKind>(), Ok(TransportKind::Http));
        assert_eq!("HTTP".parse::<TransportKind>(), Ok(TransportKind::Http));
        assert_eq!("socket".parse::<TransportKind>(), Ok(TransportKind::Socket));
        assert_eq!("ws".parse::<TransportKind>(), Ok(TransportKind::Socket));
    }

    #[test]
    fn test_transport_kind_rejects_unknown_name() {
        assert_eq!(
            "zmq".parse::<TransportKind>(),
            Err(ConfigError::UnknownTransport("zmq".to_string()))
        );
    }

    #[test]
    fn test_socket_transport_rejects_http_endpoint() {
        // Arrange
        let cfg = BridgeConfig {
            transport: TransportKind::Socket,
            ..BridgeConfig::default()
        };

        // Act
        let result = cfg.validate();

        // Assert
        assert!(matches!(result, Err(ConfigError::SchemeMismatch { .. })));
    }

    #[test]
    fn test_socket_transport_accepts_ws_endpoint() {
        let cfg = BridgeConfig {
            transport: TransportKind::Socket,
            endpoint: parse_endpoint("ws://127.0.0.1:3001").unwrap(),
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_parse_endpoint_rejects_relative_path() {
        let result = parse_endpoint("v01/rs232/80");
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Http.to_string(), "http");
        assert_eq!(TransportKind::Socket.to_string(), "socket");
    }
}
