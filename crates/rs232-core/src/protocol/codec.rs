//! JSON codec for envelope batches.
//!
//! Wire format (identical for both transports):
//! ```text
//! [{"command":"tx","data":"AT\r"},{"command":"tx","data":"ATZ\r"}]
//! ```
//! An empty array `[]` is valid and means "no messages this round".
//!
//! `data` is a JSON string.  Serial bytes are converted with lossy UTF-8, so
//! byte sequences that are not valid UTF-8 arrive at the peer with U+FFFD in
//! place of the invalid bytes.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::protocol::envelope::{Command, Envelope};

/// Errors that can occur during envelope encoding or decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The inbound bytes are not a JSON array of well-formed envelopes
    /// (missing `command`, unrecognised command value, wrong JSON shape).
    #[error("malformed envelope batch: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The batch could not be serialised.
    #[error("failed to encode envelope batch: {0}")]
    Encode(#[source] serde_json::Error),
}

/// On-the-wire shape of one envelope.
///
/// `command` has no default: a missing or unknown value must fail decoding
/// rather than be coerced.  `data` may be absent or `null`; both mean an
/// empty payload.
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    command: Command,
    #[serde(default, deserialize_with = "null_as_empty")]
    data: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<&Envelope> for WireEnvelope {
    fn from(env: &Envelope) -> Self {
        Self {
            command: env.command(),
            data: String::from_utf8_lossy(env.data()).into_owned(),
        }
    }
}

impl From<WireEnvelope> for Envelope {
    fn from(wire: WireEnvelope) -> Self {
        Envelope::new(wire.command, wire.data.into_bytes())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a batch of envelopes as a JSON array.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialisation fails.
///
/// # Examples
///
/// ```rust
/// use rs232_core::{decode, encode, Envelope};
///
/// let batch = vec![Envelope::rx("hello")];
/// let bytes = encode(&batch).unwrap();
/// assert_eq!(bytes, br#"[{"command":"rx","data":"hello"}]"#);
/// assert_eq!(decode(&bytes).unwrap(), batch);
/// ```
pub fn encode(batch: &[Envelope]) -> Result<Vec<u8>, CodecError> {
    let wire: Vec<WireEnvelope> = batch.iter().map(WireEnvelope::from).collect();
    serde_json::to_vec(&wire).map_err(CodecError::Encode)
}

/// Decodes a JSON array of envelopes, preserving order.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if the bytes are not a JSON array, or if
/// any element lacks `command` or carries a value other than `tx` / `rx`.  One
/// bad element rejects the whole batch.
pub fn decode(bytes: &[u8]) -> Result<Vec<Envelope>, CodecError> {
    let wire: Vec<WireEnvelope> = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;
    Ok(wire.into_iter().map(Envelope::from).collect())
}
