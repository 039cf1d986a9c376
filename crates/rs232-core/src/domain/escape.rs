//! Thread-safe interrupt counter for the console's escape hatch.
//!
//! # Why count interrupts? (for beginners)
//!
//! The interactive console forwards every keystroke to the remote serial
//! device, including Ctrl-C, because the device behind the serial line often
//! needs it (to break out of a running program, for example).  That leaves
//! the local user with no obvious way to quit the console itself.
//!
//! The compromise is a counter with two writers:
//!
//! - The **signal watcher** calls [`EscapeCounter::record_interrupt`] on every
//!   SIGINT.  Once the count reaches the threshold (10 by default) the
//!   console exits.
//! - A **ticker** calls [`EscapeCounter::tick`] every 100 ms.  If at least one
//!   interrupt arrived since the previous tick, exactly one Ctrl-C byte is
//!   forwarded to the device and the count goes back to zero.
//!
//! A single press therefore reaches the device as ordinary data, while
//! hammering Ctrl-C faster than the ticker can drain it gets you out.
//!
//! # Thread safety
//!
//! The count is an `AtomicU32`.  Increment and reset are each a single atomic
//! read-modify-write, so the signal task and the ticker task never observe a
//! torn value and never lose an increment.

use std::sync::atomic::{AtomicU32, Ordering};

/// ASCII ETX, the byte a terminal produces for Ctrl-C.
pub const INTERRUPT_BYTE: u8 = 0x03;

/// Number of un-drained interrupts that triggers console exit.
pub const DEFAULT_ESCAPE_THRESHOLD: u32 = 10;

/// Outcome of recording one interrupt signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeDecision {
    /// Below the threshold; keep running.
    Continue,
    /// Threshold reached; the console must restore the terminal and exit.
    Terminate,
}

/// Counts interrupt signals observed since the last tick.
///
/// # Examples
///
/// ```rust
/// use rs232_core::{EscapeCounter, EscapeDecision};
///
/// let counter = EscapeCounter::new(3);
/// assert_eq!(counter.record_interrupt(), EscapeDecision::Continue);
/// assert!(counter.tick()); // one interrupt pending → forward one byte
/// assert!(!counter.tick()); // drained
/// ```
#[derive(Debug)]
pub struct EscapeCounter {
    count: AtomicU32,
    threshold: u32,
}

impl EscapeCounter {
    /// Creates a counter that requests termination after `threshold`
    /// un-drained interrupts.  A threshold of 0 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    /// Records one interrupt signal and reports whether the escape threshold
    /// has been reached.
    pub fn record_interrupt(&self) -> EscapeDecision {
        // Saturating so a flood of signals can never wrap the count back
        // below the threshold.  `fetch_update` returns the previous value.
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
            .unwrap_or(u32::MAX);
        let now = previous.saturating_add(1);

        if now >= self.threshold {
            EscapeDecision::Terminate
        } else {
            EscapeDecision::Continue
        }
    }

    /// Drains the counter.
    ///
    /// Returns `true` if at least one interrupt was pending, meaning the
    /// caller must forward exactly one [`INTERRUPT_BYTE`] downlink.  The count
    /// is reset to zero regardless of its value.
    pub fn tick(&self) -> bool {
        self.count.swap(0, Ordering::AcqRel) >= 1
    }

    /// Returns the current count without modifying it.
    pub fn current(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for EscapeCounter {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_starts_at_zero() {
        let counter = EscapeCounter::default();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.threshold(), DEFAULT_ESCAPE_THRESHOLD);
    }

    #[test]
    fn test_tenth_interrupt_terminates() {
        // Arrange
        let counter = EscapeCounter::default();

        // Act – nine interrupts stay below the threshold
        for _ in 0..9 {
            assert_eq!(counter.record_interrupt(), EscapeDecision::Continue);
        }

        // Assert – the tenth crosses it
        assert_eq!(counter.record_interrupt(), EscapeDecision::Terminate);
    }

    #[test]
    fn test_tick_after_nine_resets_and_requests_one_forward() {
        // Arrange
        let counter = EscapeCounter::default();
        for _ in 0..9 {
            counter.record_interrupt();
        }

        // Act
        let forward = counter.tick();

        // Assert
        assert!(forward);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_tick_with_no_interrupts_forwards_nothing() {
        let counter = EscapeCounter::default();
        assert!(!counter.tick());
    }

    #[test]
    fn test_tick_resets_window_so_threshold_restarts() {
        let counter = EscapeCounter::new(3);
        counter.record_interrupt();
        counter.record_interrupt();
        counter.tick();

        assert_eq!(counter.record_interrupt(), EscapeDecision::Continue);
        assert_eq!(counter.record_interrupt(), EscapeDecision::Continue);
        assert_eq!(counter.record_interrupt(), EscapeDecision::Terminate);
    }

    #[test]
    fn test_zero_threshold_is_clamped_to_one() {
        let counter = EscapeCounter::new(0);
        assert_eq!(counter.threshold(), 1);
        assert_eq!(counter.record_interrupt(), EscapeDecision::Terminate);
    }

    #[test]
    fn test_concurrent_interrupts_are_not_lost() {
        // Arrange – a threshold nobody will reach
        let counter = Arc::new(EscapeCounter::new(u32::MAX));

        // Act – 8 threads each record 100 interrupts
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        c.record_interrupt();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Assert
        assert_eq!(counter.current(), 800);
    }
}
