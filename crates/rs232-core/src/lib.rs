//! # rs232-core
//!
//! Shared library for the RS-232 relay containing the envelope data model,
//! the JSON envelope codec, and the interrupt escape counter used by the
//! interactive console.
//!
//! This crate is used by both the bridge and the console applications.
//! It has zero dependencies on serial devices, terminals, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! The relay connects a serial device (a modem, a sensor, a board console)
//! to a remote peer over the network.  Bytes read from the serial line travel
//! *uplink* to the peer; bytes sent by the peer travel *downlink* onto the
//! serial line.
//!
//! Every unit of exchange is an [`Envelope`]: a `command` tag saying which
//! direction the payload is travelling plus the payload bytes themselves.
//!
//! - **`protocol`** – The envelope type and the codec that turns a batch of
//!   envelopes into the JSON array sent on the wire (and back).
//!
//! - **`domain`** – Small pieces of pure, thread-safe state shared by the
//!   applications.  The most important one is the [`EscapeCounter`], which
//!   turns repeated Ctrl-C presses into an exit request.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rs232_core::Envelope` instead of `rs232_core::protocol::envelope::Envelope`.
pub use domain::escape::{EscapeCounter, EscapeDecision, DEFAULT_ESCAPE_THRESHOLD, INTERRUPT_BYTE};
pub use protocol::codec::{decode, encode, CodecError};
pub use protocol::envelope::{Command, Envelope};
