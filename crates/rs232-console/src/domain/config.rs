//! Console configuration.
//!
//! Built once in `main.rs` from CLI arguments and handed to the
//! application layer by value.

use std::time::Duration;

use rs232_bridge::domain::{parse_endpoint, ConfigError, TransportKind};
use rs232_core::DEFAULT_ESCAPE_THRESHOLD;
use thiserror::Error;
use url::Url;

/// Errors raised while validating a [`ConsoleConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConsoleConfigError {
    /// Transport or endpoint problem shared with the bridge.
    #[error(transparent)]
    Endpoint(#[from] ConfigError),

    /// The ticker interval must be non-zero.
    #[error("tick interval must be greater than zero")]
    ZeroTick,

    /// The reactor poll timeout must be non-zero.
    #[error("reactor timeout must be greater than zero")]
    ZeroReactorTimeout,
}

/// Runtime settings for the interactive console.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// Transport variant carrying envelopes to and from the device.
    pub transport: TransportKind,
    /// Remote endpoint; its scheme must suit `transport`.
    pub endpoint: Url,
    /// Interval at which pending interrupts are drained.
    pub tick: Duration,
    /// Un-drained interrupts that make the console exit.
    pub escape_threshold: u32,
    /// Upper bound on one receive wait, so shutdown is noticed promptly.
    pub reactor_timeout: Duration,
    /// Pause between GET polls (polling transport only).
    pub poll_interval: Duration,
    /// Per-request timeout (polling transport only).
    pub request_timeout: Option<Duration>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Socket,
            // Compile-time constant; cannot fail.
            endpoint: Url::parse("ws://127.0.0.1:3001").expect("default endpoint is a valid URL"),
            tick: Duration::from_millis(100),
            escape_threshold: DEFAULT_ESCAPE_THRESHOLD,
            reactor_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            request_timeout: None,
        }
    }
}

impl ConsoleConfig {
    /// Builds a configuration from raw strings, keeping the other defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleConfigError::Endpoint`] if the transport name is
    /// unknown, the endpoint is not a URL, or the scheme does not match.
    pub fn for_endpoint(transport: &str, endpoint: &str) -> Result<Self, ConsoleConfigError> {
        let config = Self {
            transport: transport.parse()?,
            endpoint: parse_endpoint(endpoint)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// See [`ConsoleConfigError`].
    pub fn validate(&self) -> Result<(), ConsoleConfigError> {
        let scheme = self.endpoint.scheme();
        if !self.transport.accepts_scheme(scheme) {
            return Err(ConfigError::SchemeMismatch {
                scheme: scheme.to_string(),
                transport: self.transport,
            }
            .into());
        }
        if self.tick.is_zero() {
            return Err(ConsoleConfigError::ZeroTick);
        }
        if self.reactor_timeout.is_zero() {
            return Err(ConsoleConfigError::ZeroReactorTimeout);
        }
        Ok(())
    }
}
