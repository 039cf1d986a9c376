//! Protocol module containing the envelope type and the JSON codec.

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, CodecError};
pub use envelope::{Command, Envelope};
