//! Domain layer for rs232-bridge.
//!
//! Plain configuration types.  Nothing here opens a device or a socket; the
//! binaries populate these structs from CLI arguments and hand them to the
//! infrastructure layer.

pub mod config;

pub use config::{parse_endpoint, BridgeConfig, ConfigError, SerialSettings, TransportKind};
