//! Bridge engine: the uplink and downlink pumps.
//!
//! # Data flow
//!
//! ```text
//! SerialReader ──(raw bytes)──► uplink pump ──(rx envelope)──► Transport::send
//! Transport::receive ──(batch)──► downlink pump ──(tx data)──► SerialWriter
//! ```
//!
//! The two pumps run as independent Tokio tasks.  They share nothing except
//! the transport (behind an `Arc`) and the `running` flag; the serial link is
//! split so each pump owns its own half.
//!
//! # Failure policy
//!
//! | Failure                         | Handling                              |
//! |---------------------------------|---------------------------------------|
//! | serial read / availability      | log, skip, keep polling               |
//! | serial write                    | log, continue with next envelope      |
//! | malformed inbound batch         | log, drop batch, receive again        |
//! | non-fatal transport failure     | log, retry on next iteration          |
//! | fatal transport failure         | pump returns the error                |
//!
//! Each step is also exposed on its own ([`uplink_step`], [`downlink_step`])
//! so tests can drive exactly one iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rs232_core::Envelope;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::ports::{SerialReader, SerialWriter, Transport, TransportError};

/// Pause before receiving again after a non-fatal receive failure, so an
/// unreachable endpoint does not turn into a hot loop of log lines.
pub const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Errors that end the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A pump hit a fatal transport failure.
    #[error("{direction} pump stopped: {source}")]
    Pump {
        direction: &'static str,
        #[source]
        source: TransportError,
    },

    /// A pump task panicked or was cancelled.
    #[error("{direction} pump task failed: {reason}")]
    Task {
        direction: &'static str,
        reason: String,
    },
}

// ── Uplink ────────────────────────────────────────────────────────────────────

/// What one uplink iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkOutcome {
    /// Nothing was waiting on the serial line; no read was attempted.
    Idle,
    /// `n` bytes were read and handed to the transport as one `rx` envelope.
    Forwarded(usize),
    /// The serial availability query or the read failed (logged).
    ReadFailed,
    /// The bytes were read but the transport rejected them (logged).
    SendFailed,
}

/// Runs one uplink iteration.
///
/// Queries availability; when bytes are waiting, reads them and sends them as
/// exactly one `rx` envelope whose data is exactly what `read` returned.
///
/// # Errors
///
/// Returns the transport error only when it is fatal.
pub async fn uplink_step<R>(
    reader: &mut R,
    transport: &dyn Transport,
) -> Result<UplinkOutcome, TransportError>
where
    R: SerialReader + ?Sized,
{
    let available = match reader.bytes_available() {
        Ok(0) => return Ok(UplinkOutcome::Idle),
        Ok(n) => n,
        Err(e) => {
            warn!("uplink: serial availability query failed: {e}");
            return Ok(UplinkOutcome::ReadFailed);
        }
    };

    let bytes = match reader.read(available) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("uplink: serial read of {available} bytes failed: {e}");
            return Ok(UplinkOutcome::ReadFailed);
        }
    };

    // The driver may report bytes that a timed-out read then fails to return.
    if bytes.is_empty() {
        return Ok(UplinkOutcome::Idle);
    }

    let len = bytes.len();
    debug!("uplink: read {len} bytes from serial");

    let envelope = Envelope::rx(bytes);
    match transport.send(std::slice::from_ref(&envelope)).await {
        Ok(()) => Ok(UplinkOutcome::Forwarded(len)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("uplink: {} send of {len} bytes failed: {e}", transport.kind());
            Ok(UplinkOutcome::SendFailed)
        }
    }
}

/// Runs the uplink pump until `running` is cleared or the transport fails
/// fatally.
///
/// When the serial line is idle the pump sleeps for `idle`, or just yields
/// to the scheduler when `idle` is zero.
///
/// # Errors
///
/// Returns the first fatal [`TransportError`].
pub async fn run_uplink_pump<R>(
    mut reader: R,
    transport: Arc<dyn Transport>,
    idle: Duration,
    running: Arc<AtomicBool>,
) -> Result<(), TransportError>
where
    R: SerialReader,
{
    info!("uplink pump started ({} transport)", transport.kind());

    while running.load(Ordering::Relaxed) {
        match uplink_step(&mut reader, transport.as_ref()).await? {
            UplinkOutcome::Idle | UplinkOutcome::ReadFailed => pause(idle).await,
            UplinkOutcome::Forwarded(_) | UplinkOutcome::SendFailed => {}
        }
    }

    info!("uplink pump stopped");
    Ok(())
}

// ── Downlink ──────────────────────────────────────────────────────────────────

/// Tally of what happened to one inbound batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownlinkReport {
    /// `tx` envelopes written to the serial line in full.
    pub written: usize,
    /// `tx` envelopes whose write failed (logged).
    pub failed: usize,
    /// Envelopes not written: `rx` tags or empty payloads.
    pub skipped: usize,
}

/// What one downlink iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownlinkOutcome {
    /// A batch was received and applied.
    Applied(DownlinkReport),
    /// The inbound batch was malformed and dropped.
    Dropped,
    /// The receive failed with a retryable error.
    ReceiveFailed,
}

/// Writes every `tx` envelope of `batch` to the serial line, in order.
///
/// A failed write is logged and the rest of the batch is still attempted.
pub fn apply_batch<W>(writer: &mut W, batch: Vec<Envelope>) -> DownlinkReport
where
    W: SerialWriter + ?Sized,
{
    let mut report = DownlinkReport::default();

    for envelope in batch {
        if !envelope.is_tx() {
            debug!("downlink: ignoring '{}' envelope", envelope.command());
            report.skipped += 1;
            continue;
        }
        if envelope.data().is_empty() {
            report.skipped += 1;
            continue;
        }

        match writer.write(envelope.data()) {
            Ok(n) => {
                debug!("downlink: wrote {n} bytes to serial");
                report.written += 1;
            }
            Err(e) => {
                warn!(
                    "downlink: serial write of {} bytes failed: {e}",
                    envelope.data().len()
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// Runs one downlink iteration: receive one batch, apply it.
///
/// The writer is moved onto Tokio's blocking pool for the writes (a long
/// payload at 115200 baud takes a noticeable time to drain) and handed back
/// with the outcome.
///
/// # Errors
///
/// Returns the transport error only when it is fatal.
pub async fn downlink_step<W>(
    writer: W,
    transport: &dyn Transport,
) -> Result<(W, DownlinkOutcome), TransportError>
where
    W: SerialWriter + 'static,
{
    match transport.receive().await {
        Ok(batch) => {
            let (writer, report) = apply_batch_blocking(writer, batch).await;
            Ok((writer, DownlinkOutcome::Applied(report)))
        }
        Err(e) if e.is_malformed() => {
            warn!("downlink: dropping inbound batch: {e}");
            Ok((writer, DownlinkOutcome::Dropped))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("downlink: {} receive failed: {e}", transport.kind());
            Ok((writer, DownlinkOutcome::ReceiveFailed))
        }
    }
}

/// Runs [`apply_batch`] on the blocking pool.
async fn apply_batch_blocking<W>(mut writer: W, batch: Vec<Envelope>) -> (W, DownlinkReport)
where
    W: SerialWriter + 'static,
{
    if batch.is_empty() {
        return (writer, DownlinkReport::default());
    }

    let joined = tokio::task::spawn_blocking(move || {
        let report = apply_batch(&mut writer, batch);
        (writer, report)
    })
    .await;

    match joined {
        Ok(done) => done,
        // Blocking tasks are never aborted, so a join error is a panic
        // inside the writer; re-raise it on the pump task.
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

/// Runs the downlink pump until `running` is cleared or the transport fails
/// fatally.
///
/// # Errors
///
/// Returns the first fatal [`TransportError`].
pub async fn run_downlink_pump<W>(
    mut writer: W,
    transport: Arc<dyn Transport>,
    running: Arc<AtomicBool>,
) -> Result<(), TransportError>
where
    W: SerialWriter + 'static,
{
    info!("downlink pump started ({} transport)", transport.kind());

    while running.load(Ordering::Relaxed) {
        let (returned, outcome) = downlink_step(writer, transport.as_ref()).await?;
        writer = returned;
        if outcome == DownlinkOutcome::ReceiveFailed {
            tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
        }
    }

    info!("downlink pump stopped");
    Ok(())
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Starts both pumps and waits until either of them ends.
///
/// Clearing `running` stops both pumps at their next iteration.  When one
/// pump ends on its own (fatal transport error), `running` is cleared so the
/// other follows; it is not aborted mid-operation.
///
/// # Errors
///
/// Returns [`BridgeError::Pump`] for a fatal transport failure and
/// [`BridgeError::Task`] if a pump task panicked.
pub async fn run_bridge<R, W>(
    reader: R,
    writer: W,
    transport: Arc<dyn Transport>,
    serial_idle: Duration,
    running: Arc<AtomicBool>,
) -> Result<(), BridgeError>
where
    R: SerialReader + 'static,
    W: SerialWriter + 'static,
{
    let uplink = tokio::spawn(run_uplink_pump(
        reader,
        Arc::clone(&transport),
        serial_idle,
        Arc::clone(&running),
    ));
    let downlink = tokio::spawn(run_downlink_pump(writer, transport, Arc::clone(&running)));

    let (direction, joined) = tokio::select! {
        r = uplink => ("uplink", r),
        r = downlink => ("downlink", r),
    };

    running.store(false, Ordering::Relaxed);

    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(BridgeError::Pump { direction, source }),
        Err(e) => Err(BridgeError::Task {
            direction,
            reason: e.to_string(),
        }),
    }
}

async fn pause(idle: Duration) {
    if idle.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(idle).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
