//! Receive (reactor) loop: renders inbound device output on the screen.
//!
//! On a socket transport each iteration waits for one inbound batch for at
//! most `reactor_timeout`, so the loop re-checks the console state at least
//! that often.  Dropping a pending socket read loses nothing.  A polling
//! receive is a whole HTTP GET plus the poll pause and already returns on its
//! own schedule; cutting it short would discard a response in flight, so it
//! is awaited to completion.

use std::io::Write;
use std::time::Duration;

use rs232_bridge::application::bridge_service::RECEIVE_RETRY_DELAY;
use rs232_bridge::application::{Transport, TransportError};
use rs232_bridge::domain::TransportKind;
use rs232_core::Envelope;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::application::{render_batch, Console, ConsoleState};

/// Receives batches through the console's transport and renders their `rx`
/// data to `out` until the console leaves `Running`.
///
/// Decode failures and other non-fatal receive errors are logged, followed
/// by a short pause before the next attempt.
///
/// # Errors
///
/// Returns a fatal transport error (socket failure or close).
pub async fn run_receive_loop<W: Write>(
    console: &Console,
    reactor_timeout: Duration,
    mut out: W,
) -> Result<(), TransportError> {
    let transport = console.transport();

    while console.state() == ConsoleState::Running {
        let Some(received) = receive_once(transport.as_ref(), reactor_timeout).await else {
            continue;
        };
        let batch = match received {
            Ok(batch) => batch,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("receive failed: {e}");
                tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                continue;
            }
        };

        match render_batch(&batch, &mut out) {
            Ok(n) => debug!("rendered {n} of {} envelopes", batch.len()),
            Err(e) => warn!("cannot write to terminal: {e}"),
        }
    }
    Ok(())
}

/// One receive attempt; `None` means the socket wait timed out.
async fn receive_once(
    transport: &dyn Transport,
    reactor_timeout: Duration,
) -> Option<Result<Vec<Envelope>, TransportError>> {
    match transport.kind() {
        TransportKind::Socket => timeout(reactor_timeout, transport.receive()).await.ok(),
        TransportKind::Http => Some(transport.receive().await),
    }
}
