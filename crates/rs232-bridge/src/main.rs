//! RS-232 bridge: entry point.
//!
//! Opens the serial device, connects the selected transport, and runs the
//! uplink and downlink pumps until a shutdown signal arrives or the transport
//! fails fatally.
//!
//! # Usage
//!
//! ```text
//! rs232-bridge [OPTIONS]
//!
//! Options:
//!   --serial-path        <PATH>  Serial device node       [default: /dev/ttyS1]
//!   --transport          <KIND>  http | socket            [default: http]
//!   --endpoint           <URL>   Remote endpoint          [default: http://127.0.0.1:3000/v01/rs232/80]
//!   --serial-idle-ms     <MS>    Idle pause when no input [default: 1]
//!   --poll-interval-ms   <MS>    Pause between GET polls  [default: 100]
//!   --request-timeout-ms <MS>    HTTP request timeout     [default: none]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                   | Flag                   |
//! |----------------------------|------------------------|
//! | `RS232_SERIAL_PATH`        | `--serial-path`        |
//! | `RS232_TRANSPORT`          | `--transport`          |
//! | `RS232_ENDPOINT`           | `--endpoint`           |
//! | `RS232_SERIAL_IDLE_MS`     | `--serial-idle-ms`     |
//! | `RS232_POLL_INTERVAL_MS`   | `--poll-interval-ms`   |
//! | `RS232_REQUEST_TIMEOUT_MS` | `--request-timeout-ms` |
//!
//! # Exit status
//!
//! 0 after a shutdown signal.  Non-zero if the serial device cannot be
//! opened, the transport cannot be established, or a socket session dies
//! (a supervising process is expected to restart the bridge).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use rs232_bridge::application::run_bridge;
use rs232_bridge::domain::{parse_endpoint, BridgeConfig, SerialSettings, TransportKind};
use rs232_bridge::infrastructure::{connect_transport, SerialLink};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bridge an RS-232 serial device to a remote message channel.
#[derive(Debug, Parser)]
#[command(
    name = "rs232-bridge",
    about = "Bridge an RS-232 serial device to an HTTP polling or WebSocket endpoint",
    version
)]
struct Cli {
    /// Serial device node (e.g. /dev/ttyS1, /dev/ttyUSB0, COM3).
    #[arg(long, default_value = "/dev/ttyS1", env = "RS232_SERIAL_PATH")]
    serial_path: String,

    /// Transport variant: `http` (polling) or `socket` (WebSocket).
    #[arg(long, default_value = "http", env = "RS232_TRANSPORT")]
    transport: String,

    /// Remote endpoint URL; its scheme must match the transport.
    #[arg(
        long,
        default_value = "http://127.0.0.1:3000/v01/rs232/80",
        env = "RS232_ENDPOINT"
    )]
    endpoint: String,

    /// Pause in milliseconds when the serial line has no input.  0 yields
    /// and re-checks immediately.
    #[arg(long, default_value_t = 1, env = "RS232_SERIAL_IDLE_MS")]
    serial_idle_ms: u64,

    /// Pause in milliseconds between downlink GET polls.
    #[arg(long, default_value_t = 100, env = "RS232_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// HTTP request timeout in milliseconds.  Unset means no timeout.
    #[arg(long, env = "RS232_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,
}

impl Cli {
    /// Converts the parsed CLI arguments into a validated [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the transport name is unknown, the endpoint is not
    /// a URL, or the endpoint scheme does not suit the transport.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let transport: TransportKind = self
            .transport
            .parse()
            .with_context(|| format!("invalid --transport '{}'", self.transport))?;
        let endpoint = parse_endpoint(&self.endpoint)?;

        let config = BridgeConfig {
            serial_path: self.serial_path,
            serial: SerialSettings::default(),
            transport,
            endpoint,
            serial_idle: Duration::from_millis(self.serial_idle_ms),
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
    // Log level comes from `RUST_LOG`; default `info`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_bridge_config()?;

    info!(
        "RS-232 bridge starting: serial={}, transport={}, endpoint={}",
        config.serial_path, config.transport, config.endpoint
    );

    // ── Fatal setup: serial device, then transport ─────────────────────────────
    let link = SerialLink::open(&config.serial_path, &config.serial)
        .context("cannot open serial device")?;
    debug!("splitting serial link {} into reader and writer", link.path());
    let (reader, writer) = link.split().context("cannot split serial link")?;

    let transport = connect_transport(&config)
        .await
        .context("cannot establish transport")?;

    // ── Pumps ──────────────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let bridge = run_bridge(
        reader,
        writer,
        transport,
        config.serial_idle,
        Arc::clone(&running),
    );

    tokio::select! {
        result = bridge => {
            result.context("bridge stopped")?;
        }
        () = shutdown_signal() => {
            info!("shutdown signal received; stopping pumps");
            running.store(false, Ordering::Relaxed);
        }
    }

    // The pump tasks own the serial halves; the device closes when the
    // runtime drops them on exit.
    info!("RS-232 bridge stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
