//! Terminal mode guard.
//!
//! Puts the controlling terminal into byte-at-a-time, no-echo mode for the
//! lifetime of a [`TerminalGuard`] and puts the saved settings back when the
//! guard is restored or dropped.
//!
//! # Why not full raw mode?
//!
//! Full raw mode (`cfmakeraw`) also clears `ISIG`, which would turn Ctrl-C
//! into a plain `0x03` byte and stop the kernel from raising SIGINT.  The
//! escape counter relies on SIGINT, so only these changes are made:
//!
//! | Flag / slot | Value     | Effect                                   |
//! |-------------|-----------|------------------------------------------|
//! | `ICANON`    | cleared   | no line buffering, bytes arrive at once  |
//! | `ECHO`      | cleared   | typed keys are not echoed locally        |
//! | `VMIN`      | 1         | a read returns after a single byte       |
//! | `VTIME`     | 0         | no inter-byte timer                      |
//!
//! When stdin is not a terminal (piped input, CI) the guard does nothing.

use thiserror::Error;

/// Errors from reading or changing terminal attributes.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[cfg(unix)]
    #[error("terminal attribute call failed: {0}")]
    Termios(#[from] nix::errno::Errno),
}

#[cfg(unix)]
mod imp {
    use std::io::{self, IsTerminal};
    use std::sync::{Mutex, PoisonError};

    use nix::sys::termios::{
        tcgetattr, tcsetattr, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
    };
    use tracing::{debug, warn};

    use super::TerminalError;

    /// Restores the saved terminal settings on [`restore`](Self::restore) or
    /// drop, whichever comes first.
    pub struct TerminalGuard {
        original: Mutex<Option<Termios>>,
    }

    impl TerminalGuard {
        /// Saves the current stdin settings and switches to
        /// byte-at-a-time, no-echo mode.
        ///
        /// # Errors
        ///
        /// Returns [`TerminalError::Termios`] if the attributes cannot be read
        /// or written.
        pub fn acquire() -> Result<Self, TerminalError> {
            let stdin = io::stdin();
            if !stdin.is_terminal() {
                debug!("stdin is not a terminal; leaving its mode alone");
                return Ok(Self {
                    original: Mutex::new(None),
                });
            }

            let original = tcgetattr(&stdin)?;
            let mut raw = original.clone();
            raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
            raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
            raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
            tcsetattr(&stdin, SetArg::TCSAFLUSH, &raw)?;

            Ok(Self {
                original: Mutex::new(Some(original)),
            })
        }

        /// Returns `true` while saved settings are waiting to be restored.
        pub fn is_active(&self) -> bool {
            self.original
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        }

        /// Puts the saved settings back.  Later calls do nothing.
        ///
        /// Must be called explicitly before `std::process::exit`, which skips
        /// destructors.
        ///
        /// # Errors
        ///
        /// Returns [`TerminalError::Termios`] if the attributes cannot be
        /// written.
        pub fn restore(&self) -> Result<(), TerminalError> {
            let saved = self
                .original
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(termios) = saved {
                tcsetattr(&io::stdin(), SetArg::TCSAFLUSH, &termios)?;
                debug!("terminal mode restored");
            }
            Ok(())
        }
    }

    impl Drop for TerminalGuard {
        fn drop(&mut self) {
            if let Err(e) = self.restore() {
                warn!("failed to restore terminal mode: {e}");
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::TerminalError;

    /// No-op guard: the console runs in the terminal's default mode.
    pub struct TerminalGuard;

    impl TerminalGuard {
        pub fn acquire() -> Result<Self, TerminalError> {
            Ok(Self)
        }

        pub fn is_active(&self) -> bool {
            false
        }

        pub fn restore(&self) -> Result<(), TerminalError> {
            Ok(())
        }
    }
}

pub use imp::TerminalGuard;

/// A terminal whose original mode can be put back.
pub trait TerminalMode {
    /// Restores the saved mode.  Must be safe to call more than once.
    fn restore(&self) -> Result<(), TerminalError>;
}

impl TerminalMode for TerminalGuard {
    fn restore(&self) -> Result<(), TerminalError> {
        TerminalGuard::restore(self)
    }
}
