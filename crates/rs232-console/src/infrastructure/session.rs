//! One console session, from the first keystroke to terminal restore.
//!
//! [`run_session`] runs the console event loop and the receive loop side by
//! side.  Whichever ends first ends the session, and the terminal is put
//! back in its original mode on every exit path: escape threshold, SIGTERM,
//! or a dead transport.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::application::{run_console, Console, ConsoleError, ConsoleSignal, ExitReason};
use crate::domain::ConsoleConfig;
use crate::infrastructure::receive_loop::run_receive_loop;
use crate::infrastructure::terminal::TerminalMode;

/// Runs the console until it terminates, then restores `terminal`.
///
/// Inbound device output is rendered to `out`.
///
/// # Errors
///
/// Returns [`ConsoleError`] if the transport fails fatally on either the
/// send or the receive side, or if a console task panics.  The terminal is
/// restored before the error is returned.
pub async fn run_session<T, W>(
    console: Arc<Console>,
    keys: mpsc::Receiver<u8>,
    signals: mpsc::Receiver<ConsoleSignal>,
    config: &ConsoleConfig,
    out: W,
    terminal: &T,
) -> Result<ExitReason, ConsoleError>
where
    T: TerminalMode + ?Sized,
    W: Write,
{
    let session = run_console(Arc::clone(&console), keys, signals, config.tick);
    let receiver = run_receive_loop(&console, config.reactor_timeout, out);
    tokio::pin!(session);
    tokio::pin!(receiver);

    let outcome = tokio::select! {
        exit = &mut session => exit,
        received = &mut receiver => match received {
            // The receive loop only stops cleanly once the console has left
            // `Running`, so the session is about to report why.
            Ok(()) => session.await,
            Err(e) => Err(e.into()),
        },
    };

    match &outcome {
        Ok(reason) => info!("console stopped: {reason:?}"),
        Err(e) => error!("console session ended: {e}"),
    }
    if let Err(e) = terminal.restore() {
        error!("failed to restore terminal mode: {e}");
    }
    outcome
}
