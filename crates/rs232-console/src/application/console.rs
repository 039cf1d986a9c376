//! The console state machine and its event loop.
//!
//! # States
//!
//! ```text
//!            keystroke / tick / interrupt below threshold
//!              ┌────────┐
//!              ▼        │
//!          ┌─────────┐──┘     interrupt reaching threshold,
//!  start ─►│ Running │──────────────────────────────────────┐
//!          └─────────┘        or SIGTERM                     ▼
//!                                                    ┌─────────────┐
//!                                                    │ Terminating │
//!                                                    └─────────────┘
//! ```
//!
//! `Terminating` is final.  Once entered, [`run_console`] returns and the
//! caller restores the terminal and exits.
//!
//! # Event sources (for beginners)
//!
//! Three independent producers feed the console:
//!
//! | Source          | Event                   | Handler                         |
//! |-----------------|-------------------------|---------------------------------|
//! | keystroke thread| one byte from stdin     | [`Console::on_keystroke`]       |
//! | signal watcher  | SIGINT / SIGTERM        | [`Console::on_signal`]          |
//! | ticker          | every `tick` interval   | [`Console::on_tick`]            |
//!
//! [`run_console`] gives each producer its own Tokio task.  Keystroke and
//! tick handlers await `Transport::send`, which can stall on a hung peer; the
//! signal task never sends, so the escape threshold and SIGTERM are honoured
//! even while a send is stuck.  The only state the tasks share is the
//! [`EscapeCounter`], which is atomic.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rs232_bridge::application::{Transport, TransportError};
use rs232_core::{EscapeCounter, EscapeDecision, Envelope, INTERRUPT_BYTE};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lifecycle state of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    /// Capturing keystrokes and rendering inbound data.
    Running,
    /// Exit requested; the terminal must be restored.
    Terminating,
}

/// OS-level signal delivered to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleSignal {
    /// SIGINT (Ctrl-C at the terminal).
    Interrupt,
    /// SIGTERM; exits without consulting the escape counter.
    Terminate,
}

/// Why [`run_console`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The escape threshold of repeated interrupts was reached.
    EscapeThreshold,
    /// A terminate signal arrived.
    TerminateSignal,
    /// The signal source went away, so the console can no longer be stopped
    /// by the user.
    SignalsClosed,
}

/// Errors that end a console session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The transport failed fatally (socket error or close).
    #[error("session lost: {0}")]
    Transport(#[from] TransportError),

    /// One of the console's tasks panicked.
    #[error("{task} task failed: {reason}")]
    Task { task: &'static str, reason: String },
}

fn task_failed(task: &'static str, e: JoinError) -> ConsoleError {
    ConsoleError::Task {
        task,
        reason: e.to_string(),
    }
}

/// Aborts the tasks it holds when dropped, so cancelling [`run_console`]
/// does not leave them behind.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// The interactive console.
///
/// Shared between the event loop and the receive loop through an `Arc`;
/// every method takes `&self`.
pub struct Console {
    transport: Arc<dyn Transport>,
    counter: EscapeCounter,
    terminating: AtomicBool,
}

impl Console {
    /// Creates a console in the `Running` state.
    pub fn new(transport: Arc<dyn Transport>, escape_threshold: u32) -> Self {
        Self {
            transport,
            counter: EscapeCounter::new(escape_threshold),
            terminating: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsoleState {
        if self.terminating.load(Ordering::Acquire) {
            ConsoleState::Terminating
        } else {
            ConsoleState::Running
        }
    }

    /// The shared interrupt counter.
    pub fn escape_counter(&self) -> &EscapeCounter {
        &self.counter
    }

    /// The transport the console talks through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Handles one captured keystroke.
    ///
    /// Ordinary bytes are sent at once as a single-byte `tx` envelope.  An
    /// in-band [`INTERRUPT_BYTE`] (only seen when stdin is not a terminal that
    /// turns Ctrl-C into SIGINT) is treated exactly like a SIGINT, so it goes
    /// through the escape counter instead of being sent directly.
    ///
    /// # Errors
    ///
    /// Returns the transport error if it is fatal to the session.  Other send
    /// failures are logged and the keystroke is dropped.
    pub async fn on_keystroke(&self, byte: u8) -> Result<ConsoleState, TransportError> {
        if self.state() == ConsoleState::Terminating {
            return Ok(ConsoleState::Terminating);
        }
        if byte == INTERRUPT_BYTE {
            return Ok(self.on_signal(ConsoleSignal::Interrupt));
        }

        self.forward(byte).await?;
        Ok(self.state())
    }

    /// Handles one OS signal.
    pub fn on_signal(&self, signal: ConsoleSignal) -> ConsoleState {
        match signal {
            ConsoleSignal::Interrupt => {
                if self.counter.record_interrupt() == EscapeDecision::Terminate {
                    info!(
                        "{} interrupts without a tick; leaving console",
                        self.counter.threshold()
                    );
                    self.terminating.store(true, Ordering::Release);
                } else {
                    debug!("interrupt recorded ({} pending)", self.counter.current());
                }
            }
            ConsoleSignal::Terminate => {
                info!("terminate signal received; leaving console");
                self.terminating.store(true, Ordering::Release);
            }
        }
        self.state()
    }

    /// Handles one ticker fire.
    ///
    /// Drains the escape counter and, if any interrupt was pending, forwards
    /// exactly one [`INTERRUPT_BYTE`].  Returns whether a byte was forwarded.
    ///
    /// # Errors
    ///
    /// Returns the transport error if it is fatal to the session.
    pub async fn on_tick(&self) -> Result<bool, TransportError> {
        if !self.counter.tick() {
            return Ok(false);
        }
        self.forward(INTERRUPT_BYTE).await?;
        Ok(true)
    }

    async fn forward(&self, byte: u8) -> Result<(), TransportError> {
        match self.transport.send(&[Envelope::tx(vec![byte])]).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("keystroke 0x{byte:02x} not delivered: {e}");
                Ok(())
            }
        }
    }
}

/// Writes the data of every `rx` envelope in `batch` to `out` as text and
/// flushes.  Returns the number of envelopes rendered.
///
/// Invalid UTF-8 is rendered with U+FFFD.  `tx` envelopes are ignored.
///
/// # Errors
///
/// Returns any I/O error from `out`.
pub fn render_batch<W: Write>(batch: &[Envelope], out: &mut W) -> io::Result<usize> {
    let mut rendered = 0;
    for envelope in batch.iter().filter(|e| e.is_rx()) {
        out.write_all(String::from_utf8_lossy(envelope.data()).as_bytes())?;
        rendered += 1;
    }
    out.flush()?;
    Ok(rendered)
}

/// Drives `console` from its three event sources until it terminates.
///
/// Signals, ticks, and keystrokes are each handled on their own task, so a
/// send stalled on the transport delays only its own producer.  The first
/// tick fires one `tick` after the call, not immediately.  When the
/// keystroke channel closes (stdin hit end of file) the console keeps
/// running on signals and ticks alone.  All three tasks are stopped when
/// this returns or is cancelled.
///
/// # Errors
///
/// Returns [`ConsoleError::Transport`] for a fatal transport error raised
/// while forwarding a keystroke or an interrupt byte, and
/// [`ConsoleError::Task`] if a task panicked.
pub async fn run_console(
    console: Arc<Console>,
    keys: mpsc::Receiver<u8>,
    signals: mpsc::Receiver<ConsoleSignal>,
    tick: Duration,
) -> Result<ExitReason, ConsoleError> {
    let mut signal_task = tokio::spawn(watch_signals(Arc::clone(&console), signals));
    let mut tick_task = tokio::spawn(drive_ticker(Arc::clone(&console), tick));
    let mut key_task = tokio::spawn(forward_keystrokes(Arc::clone(&console), keys));
    let _tasks = AbortOnDrop(vec![
        signal_task.abort_handle(),
        tick_task.abort_handle(),
        key_task.abort_handle(),
    ]);
    let mut keys_open = true;

    loop {
        tokio::select! {
            biased;

            joined = &mut signal_task => break joined.map_err(|e| task_failed("signal", e)),

            joined = &mut tick_task => break match joined {
                Ok(e) => Err(e.into()),
                Err(e) => Err(task_failed("ticker", e)),
            },

            joined = &mut key_task, if keys_open => match joined {
                Ok(Ok(None)) => {
                    info!("keyboard input closed");
                    keys_open = false;
                }
                Ok(Ok(Some(reason))) => break Ok(reason),
                Ok(Err(e)) => break Err(e.into()),
                Err(e) => break Err(task_failed("keystroke", e)),
            },
        }
    }
}

/// Feeds OS signals to the console until it terminates.
async fn watch_signals(
    console: Arc<Console>,
    mut signals: mpsc::Receiver<ConsoleSignal>,
) -> ExitReason {
    while let Some(signal) = signals.recv().await {
        if console.on_signal(signal) == ConsoleState::Terminating {
            return match signal {
                ConsoleSignal::Interrupt => ExitReason::EscapeThreshold,
                ConsoleSignal::Terminate => ExitReason::TerminateSignal,
            };
        }
    }
    warn!("signal watcher stopped");
    ExitReason::SignalsClosed
}

/// Drains the escape counter every `tick`.  Returns only on a fatal error.
async fn drive_ticker(console: Arc<Console>, tick: Duration) -> TransportError {
    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match console.on_tick().await {
            Ok(true) => debug!("forwarded one interrupt byte"),
            Ok(false) => {}
            Err(e) => return e,
        }
    }
}

/// Forwards keystrokes until the channel closes (`Ok(None)`), an in-band
/// interrupt reaches the threshold, or the transport fails fatally.
async fn forward_keystrokes(
    console: Arc<Console>,
    mut keys: mpsc::Receiver<u8>,
) -> Result<Option<ExitReason>, TransportError> {
    while let Some(byte) = keys.recv().await {
        if console.on_keystroke(byte).await? == ConsoleState::Terminating {
            return Ok(Some(ExitReason::EscapeThreshold));
        }
    }
    Ok(None)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rs232_bridge::domain::TransportKind;
    use std::sync::Mutex;

    /// Transport that records sends and optionally fails them.
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<Envelope>>>,
        fail_with: Mutex<Option<TransportError>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_with: Mutex::new(None),
            })
        }

        fn sent_bytes(&self) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .map(|e| e.data().to_vec())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn receive(&self) -> Result<Vec<Envelope>, TransportError> {
            std::future::pending().await
        }

        async fn send(&self, batch: &[Envelope]) -> Result<(), TransportError> {
            if let Some(e) = self.fail_with.lock().unwrap().take() {
                return Err(e);
            }
            self.sent.lock().unwrap().push(batch.to_vec());
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Socket
        }
    }

    fn console(transport: &Arc<RecordingTransport>) -> Console {
        Console::new(Arc::clone(transport) as Arc<dyn Transport>, 10)
    }

    #[tokio::test]
    async fn test_keystroke_is_sent_immediately_as_single_tx() {
        // Arrange
        let transport = RecordingTransport::new();
        let console = console(&transport);

        // Act
        let state = console.on_keystroke(b'a').await.unwrap();

        // Assert
        assert_eq!(state, ConsoleState::Running);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], vec![Envelope::tx(b"a".to_vec())]);
    }

    #[tokio::test]
    async fn test_in_band_interrupt_byte_is_counted_not_sent() {
        let transport = RecordingTransport::new();
        let console = console(&transport);

        console.on_keystroke(INTERRUPT_BYTE).await.unwrap();

        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(console.escape_counter().current(), 1);
    }

    #[test]
    fn test_tenth_interrupt_terminates() {
        let transport = RecordingTransport::new();
        let console = console(&transport);

        for _ in 0..9 {
            assert_eq!(console.on_signal(ConsoleSignal::Interrupt), ConsoleState::Running);
        }

        assert_eq!(console.on_signal(ConsoleSignal::Interrupt), ConsoleState::Terminating);
        assert_eq!(console.state(), ConsoleState::Terminating);
    }

    #[test]
    fn test_terminate_signal_skips_threshold() {
        let transport = RecordingTransport::new();
        let console = console(&transport);

        assert_eq!(console.on_signal(ConsoleSignal::Terminate), ConsoleState::Terminating);
        assert_eq!(console.escape_counter().current(), 0);
    }

    #[tokio::test]
    async fn test_tick_forwards_one_interrupt_byte_for_many_signals() {
        // Arrange
        let transport = RecordingTransport::new();
        let console = console(&transport);
        for _ in 0..9 {
            console.on_signal(ConsoleSignal::Interrupt);
        }

        // Act
        let forwarded = console.on_tick().await.unwrap();

        // Assert
        assert!(forwarded);
        assert_eq!(console.state(), ConsoleState::Running);
        assert_eq!(console.escape_counter().current(), 0);
        assert_eq!(transport.sent_bytes(), vec![vec![INTERRUPT_BYTE]]);
    }

    #[tokio::test]
    async fn test_idle_tick_sends_nothing() {
        let transport = RecordingTransport::new();
        let console = console(&transport);

        assert!(!console.on_tick().await.unwrap());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retryable_send_failure_drops_keystroke() {
        let transport = RecordingTransport::new();
        *transport.fail_with.lock().unwrap() = Some(TransportError::Status {
            endpoint: "http://h".into(),
            status: 500,
        });
        let console = console(&transport);

        let state = console.on_keystroke(b'x').await;

        tokio_test::assert_ok!(state);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_send_failure_is_returned() {
        let transport = RecordingTransport::new();
        *transport.fail_with.lock().unwrap() = Some(TransportError::Closed);
        let console = console(&transport);

        let result = console.on_keystroke(b'x').await;

        tokio_test::assert_err!(result);
    }

    #[tokio::test]
    async fn test_keystrokes_after_termination_are_ignored() {
        let transport = RecordingTransport::new();
        let console = console(&transport);
        console.on_signal(ConsoleSignal::Terminate);

        let state = console.on_keystroke(b'q').await.unwrap();

        assert_eq!(state, ConsoleState::Terminating);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_render_batch_writes_rx_only() {
        // Arrange
        let batch = vec![
            Envelope::rx(b"login: ".to_vec()),
            Envelope::tx(b"ignored".to_vec()),
            Envelope::rx(vec![0xff, b'!']),
        ];
        let mut out = Vec::new();

        // Act
        let rendered = render_batch(&batch, &mut out).unwrap();

        // Assert
        assert_eq!(rendered, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "login: \u{FFFD}!");
    }

    #[tokio::test]
    async fn test_run_console_exits_on_terminate_signal() {
        let transport = RecordingTransport::new();
        let console = Arc::new(console(&transport));
        let (_key_tx, key_rx) = mpsc::channel(8);
        let (sig_tx, sig_rx) = mpsc::channel(8);
        sig_tx.send(ConsoleSignal::Terminate).await.unwrap();

        let reason = run_console(console, key_rx, sig_rx, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(reason, ExitReason::TerminateSignal);
    }

    #[tokio::test]
    async fn test_run_console_reports_closed_signal_source() {
        let transport = RecordingTransport::new();
        let console = Arc::new(console(&transport));
        let (_key_tx, key_rx) = mpsc::channel(8);
        let (sig_tx, sig_rx) = mpsc::channel::<ConsoleSignal>(8);
        drop(sig_tx);

        let reason = run_console(console, key_rx, sig_rx, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(reason, ExitReason::SignalsClosed);
    }

    #[tokio::test]
    async fn test_run_console_returns_fatal_keystroke_error() {
        // Arrange
        let transport = RecordingTransport::new();
        *transport.fail_with.lock().unwrap() = Some(TransportError::Closed);
        let console = Arc::new(console(&transport));
        let (key_tx, key_rx) = mpsc::channel(8);
        let (_sig_tx, sig_rx) = mpsc::channel::<ConsoleSignal>(8);
        key_tx.send(b'x').await.unwrap();

        // Act
        let result = run_console(console, key_rx, sig_rx, Duration::from_secs(3600)).await;

        // Assert
        assert!(matches!(
            result,
            Err(ConsoleError::Transport(TransportError::Closed))
        ));
    }
}
