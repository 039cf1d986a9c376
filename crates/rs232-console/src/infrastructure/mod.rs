//! Infrastructure layer for rs232-console.
//!
//! # Responsibilities
//!
//! - Switching the terminal into byte-at-a-time mode and back
//! - Reading keystrokes on a dedicated thread
//! - Watching for SIGINT / SIGTERM
//! - Rendering inbound device output (the receive loop)
//! - Running a whole session and restoring the terminal afterwards

pub mod keyboard;
pub mod receive_loop;
pub mod session;
pub mod signals;
pub mod terminal;

pub use keyboard::spawn_keystroke_reader;
pub use receive_loop::run_receive_loop;
pub use session::run_session;
pub use signals::spawn_signal_watcher;
pub use terminal::{TerminalError, TerminalGuard, TerminalMode};
