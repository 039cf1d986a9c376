//! The envelope: the only unit of exchange between the bridge and a transport.
//!
//! # Direction tags
//!
//! | Command | Meaning                                          |
//! |---------|--------------------------------------------------|
//! | `tx`    | "apply this payload to the serial line"          |
//! | `rx`    | "this payload was read from the serial line"     |
//!
//! The names are written from the serial device's point of view: the device
//! *receives* (`rx`) what the network asked us to *transmit* (`tx`).
//!
//! Envelopes are immutable once constructed.  The payload is held as raw
//! bytes; the JSON string form only exists on the wire (see
//! [`crate::protocol::codec`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction tag carried by every [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Network → serial: write the payload to the serial line.
    Tx,
    /// Serial → network: the payload was read from the serial line.
    Rx,
}

impl Command {
    /// Returns the wire spelling of the command (`"tx"` or `"rx"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Tx => "tx",
            Command::Rx => "rx",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `{command, data}` message.
///
/// # Examples
///
/// ```rust
/// use rs232_core::{Command, Envelope};
///
/// let env = Envelope::rx(b"OK\r\n".to_vec());
/// assert_eq!(env.command(), Command::Rx);
/// assert_eq!(env.data(), b"OK\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Envelope {
    command: Command,
    data: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope with an explicit command tag.
    pub fn new(command: Command, data: impl Into<Vec<u8>>) -> Self {
        Self {
            command,
            data: data.into(),
        }
    }

    /// Creates a downlink envelope (payload destined for the serial line).
    pub fn tx(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Command::Tx, data)
    }

    /// Creates an uplink envelope (payload read from the serial line).
    pub fn rx(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Command::Rx, data)
    }

    /// Returns the direction tag.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Returns the payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the envelope and returns the payload bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns `true` if this envelope should be written to the serial line.
    pub fn is_tx(&self) -> bool {
        self.command == Command::Tx
    }

    /// Returns `true` if this envelope carries data read from the serial line.
    pub fn is_rx(&self) -> bool {
        self.command == Command::Rx
    }
}
