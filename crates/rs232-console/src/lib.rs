//! # rs232-console
//!
//! An interactive terminal front-end for a remote RS-232 device.  Instead of
//! a physical serial port, the local keyboard and screen sit on one side of
//! the channel:
//!
//! ```text
//!   keyboard ──(one byte per keystroke)──► tx envelope ──► Transport ──► device
//!   screen   ◄──(rendered text)────────── rx envelope ◄── Transport ◄── device
//! ```
//!
//! # Architecture
//!
//! The crate follows the same layering as `rs232-bridge`:
//!
//! - **domain**: [`ConsoleConfig`](domain::ConsoleConfig), plain settings.
//! - **application**: the [`Console`](application::Console) state machine
//!   (`Running` → `Terminating`) and the event loop that feeds it keystrokes,
//!   signals and ticks.
//! - **infrastructure**: everything that touches the OS: the terminal-mode
//!   guard, the keystroke reader thread, the signal watcher, and the receive
//!   loop that renders inbound data.
//!
//! # How do I quit? (for beginners)
//!
//! Every key, Ctrl-C included, is meant for the remote device.  Pressing
//! Ctrl-C once forwards one interrupt byte.  Pressing it ten times faster
//! than the 100 ms ticker can drain the count exits the console.  SIGTERM
//! (`kill <pid>`) exits immediately.  Both paths restore the terminal first.

pub mod application;
pub mod domain;
pub mod infrastructure;
