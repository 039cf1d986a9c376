//! Domain layer for rs232-console: configuration only.

pub mod config;

pub use config::{ConsoleConfig, ConsoleConfigError};
