//! rs232-bridge library crate.
//!
//! This crate bridges a byte-oriented serial device to a remote message
//! channel: bytes read from the serial line are forwarded to the network, and
//! bytes arriving from the network are written back onto the serial line.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Serial device (RS-232, 115200 8N1)
//!         ↕
//! [rs232-bridge]
//!   ├── domain/           Pure types: BridgeConfig, TransportKind
//!   ├── application/      Ports (SerialReader, SerialWriter, Transport) + pumps
//!   └── infrastructure/
//!         ├── serial_link/    serialport-backed Serial Link
//!         ├── http_transport/ Polling transport (reqwest GET/POST)
//!         └── ws_transport/   Socket transport (tokio-tungstenite)
//!         ↕
//! Remote peer (JSON envelope arrays)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `rs232-core` only; every device or
//!   network call goes through a trait so tests can substitute doubles.
//! - `infrastructure` implements those traits with real drivers.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: ports and the uplink/downlink pumps.
pub mod application;

/// Infrastructure layer: serial device and network transports.
pub mod infrastructure;
