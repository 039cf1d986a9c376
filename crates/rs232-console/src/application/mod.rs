//! Application layer for rs232-console.
//!
//! Holds the console state machine.  It talks to the remote device only
//! through the bridge's [`Transport`](rs232_bridge::application::Transport)
//! trait and never touches the terminal directly, so it runs unchanged
//! against a recording transport in tests.

pub mod console;

pub use console::{
    render_batch, run_console, Console, ConsoleError, ConsoleSignal, ConsoleState, ExitReason,
};
