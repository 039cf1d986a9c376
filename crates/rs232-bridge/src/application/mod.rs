//! Application layer for rs232-bridge.
//!
//! The application layer knows *what* the bridge does (pump bytes in both
//! directions and decide what to do when something fails) but delegates
//! *how* to the infrastructure layer through the traits in [`ports`].
//!
//! # What does NOT belong here?
//!
//! - Opening the serial device (that is infrastructure)
//! - HTTP requests or WebSocket framing (that is infrastructure)
//! - CLI parsing (that is `main.rs`)

pub mod bridge_service;
pub mod ports;

pub use bridge_service::{
    apply_batch, downlink_step, run_bridge, run_downlink_pump, run_uplink_pump, uplink_step,
    BridgeError, DownlinkOutcome, DownlinkReport, UplinkOutcome,
};
pub use ports::{LinkError, SerialReader, SerialWriter, Transport, TransportError};
