//! OS signal watcher.
//!
//! Turns SIGINT and SIGTERM into [`ConsoleSignal`] events on a channel.
//! Installing the handlers replaces the default "kill the process" action,
//! which is what lets Ctrl-C reach the escape counter instead.
//!
//! Note: the kernel coalesces identical signals that arrive before the
//! watcher is polled, so very fast bursts may count as fewer interrupts.

use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::ConsoleSignal;

/// Installs the handlers and spawns a task forwarding signals to `events`.
///
/// Must be called from inside a Tokio runtime.  The task ends when the
/// receiver is dropped.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
#[cfg(unix)]
pub fn spawn_signal_watcher(events: mpsc::Sender<ConsoleSignal>) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupts = signal(SignalKind::interrupt())?;
    let mut terminations = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                Some(()) = interrupts.recv() => ConsoleSignal::Interrupt,
                Some(()) = terminations.recv() => ConsoleSignal::Terminate,
                else => break,
            };
            debug!("signal observed: {event:?}");
            if events.send(event).await.is_err() {
                break;
            }
        }
    }))
}

/// Installs the handlers and spawns a task forwarding signals to `events`.
///
/// Only Ctrl-C exists on this platform; there is no terminate signal.
///
/// # Errors
///
/// Never fails; the signature matches the Unix version.
#[cfg(not(unix))]
pub fn spawn_signal_watcher(events: mpsc::Sender<ConsoleSignal>) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C observed");
            if events.send(ConsoleSignal::Interrupt).await.is_err() {
                break;
            }
        }
    }))
}
