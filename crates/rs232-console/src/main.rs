//! RS-232 console: entry point.
//!
//! Connects to the remote device, switches the terminal to byte-at-a-time
//! mode, and runs four concurrent activities until the console terminates:
//!
//! ```text
//! main()
//!  ├─ keystroke thread   stdin byte      ──► Console::on_keystroke ──► tx envelope
//!  ├─ signal watcher     SIGINT/SIGTERM  ──► Console::on_signal
//!  ├─ ticker task                        ──► Console::on_tick      ──► one 0x03 byte
//!  └─ receive loop       rx envelope     ──► stdout
//! ```
//!
//! [`run_session`] owns everything after setup and restores the terminal on
//! every exit path.
//!
//! # Usage
//!
//! ```text
//! rs232-console [OPTIONS]
//!
//! Options:
//!   --transport          <KIND>  http | socket              [default: socket]
//!   --endpoint           <URL>   Remote endpoint            [default: ws://127.0.0.1:3001]
//!   --tick-ms            <MS>    Interrupt drain interval   [default: 100]
//!   --escape-threshold   <N>     Interrupts that exit       [default: 10]
//!   --reactor-timeout-ms <MS>    Max wait per receive       [default: 1000]
//!   --poll-interval-ms   <MS>    Pause between GET polls    [default: 100]
//!   --request-timeout-ms <MS>    HTTP request timeout       [default: none]
//! ```
//!
//! Every flag can also be set through `RS232_CONSOLE_<FLAG>` (for example
//! `RS232_CONSOLE_ENDPOINT`).  Logs go to stderr so they never mix with the
//! device output on stdout.
//!
//! # Exit status
//!
//! 0 after the escape threshold or SIGTERM.  Non-zero if the transport
//! cannot be established or the socket session dies.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rs232_bridge::domain::parse_endpoint;
use rs232_bridge::infrastructure::connect;
use rs232_console::application::Console;
use rs232_console::domain::ConsoleConfig;
use rs232_console::infrastructure::{
    run_session, spawn_keystroke_reader, spawn_signal_watcher, TerminalGuard,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Interactive terminal for a remote RS-232 device.
#[derive(Debug, Parser)]
#[command(
    name = "rs232-console",
    about = "Type into a remote RS-232 device and watch its output",
    version
)]
struct Cli {
    /// Transport variant: `socket` (WebSocket) or `http` (polling).
    #[arg(long, default_value = "socket", env = "RS232_CONSOLE_TRANSPORT")]
    transport: String,

    /// Remote endpoint URL; its scheme must match the transport.
    #[arg(long, default_value = "ws://127.0.0.1:3001", env = "RS232_CONSOLE_ENDPOINT")]
    endpoint: String,

    /// Interval in milliseconds at which pending interrupts are drained.
    #[arg(long, default_value_t = 100, env = "RS232_CONSOLE_TICK_MS")]
    tick_ms: u64,

    /// Number of Ctrl-C presses within one tick that exits the console.
    #[arg(long, default_value_t = 10, env = "RS232_CONSOLE_ESCAPE_THRESHOLD")]
    escape_threshold: u32,

    /// Longest single wait for inbound data, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "RS232_CONSOLE_REACTOR_TIMEOUT_MS")]
    reactor_timeout_ms: u64,

    /// Pause in milliseconds between GET polls (http transport).
    #[arg(long, default_value_t = 100, env = "RS232_CONSOLE_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// HTTP request timeout in milliseconds (http transport).
    #[arg(long, env = "RS232_CONSOLE_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,
}

impl Cli {
    /// Converts the parsed arguments into a validated [`ConsoleConfig`].
    fn into_console_config(self) -> anyhow::Result<ConsoleConfig> {
        let config = ConsoleConfig {
            transport: self
                .transport
                .parse()
                .with_context(|| format!("invalid --transport '{}'", self.transport))?,
            endpoint: parse_endpoint(&self.endpoint)?,
            tick: Duration::from_millis(self.tick_ms),
            escape_threshold: self.escape_threshold,
            reactor_timeout: Duration::from_millis(self.reactor_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Cli::parse().into_console_config()?;
    info!(
        "RS-232 console starting: transport={}, endpoint={}",
        config.transport, config.endpoint
    );

    let transport = connect(
        config.transport,
        &config.endpoint,
        config.poll_interval,
        config.request_timeout,
    )
    .await
    .context("cannot establish transport")?;
    let console = Arc::new(Console::new(transport, config.escape_threshold));

    // Handlers go in before the terminal changes mode, so an early Ctrl-C
    // is counted rather than killing the process with the terminal altered.
    let (signal_tx, signal_rx) = mpsc::channel(32);
    spawn_signal_watcher(signal_tx).context("cannot install signal handlers")?;

    let terminal = TerminalGuard::acquire().context("cannot switch terminal mode")?;

    let (key_tx, key_rx) = mpsc::channel(256);
    spawn_keystroke_reader(io::stdin(), key_tx).context("cannot start keystroke reader")?;

    // The keystroke thread may still be blocked on stdin when this returns;
    // it is torn down with the process, not unwound.
    run_session(console, key_rx, signal_rx, &config, io::stdout(), &terminal)
        .await
        .context("console session failed")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
