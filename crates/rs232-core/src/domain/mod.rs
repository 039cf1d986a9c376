//! Pure domain state shared by the relay applications.

pub mod escape;

pub use escape::{EscapeCounter, EscapeDecision};
