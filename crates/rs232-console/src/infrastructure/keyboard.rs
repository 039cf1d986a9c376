//! Keystroke reader.
//!
//! Reading stdin blocks, and tokio has no portable non-blocking stdin for a
//! terminal in byte-at-a-time mode.  The reader therefore runs on a plain OS
//! thread and hands each byte to the async side over an `mpsc` channel.
//!
//! A plain `std::thread` (not `spawn_blocking`) is used so a read still
//! blocked at shutdown does not keep the runtime from exiting.

use std::io::{self, ErrorKind, Read};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Spawns a thread that reads `input` one byte at a time and sends each byte
/// on `keys`.
///
/// The thread ends at end of input, on a read error, or when the receiver is
/// dropped.  Dropping `keys` at that point closes the channel.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_keystroke_reader<R>(mut input: R, keys: mpsc::Sender<u8>) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("keystroke-reader".into())
        .spawn(move || {
            let mut byte = [0u8; 1];
            loop {
                match input.read(&mut byte) {
                    Ok(0) => {
                        debug!("keyboard input reached end of file");
                        break;
                    }
                    Ok(_) => {
                        if keys.blocking_send(byte[0]).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("keyboard read failed: {e}");
                        break;
                    }
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_reader_delivers_each_byte_in_order_then_closes() {
        // Arrange
        let (tx, mut rx) = mpsc::channel(16);

        // Act
        let handle = spawn_keystroke_reader(Cursor::new(b"ls\r".to_vec()), tx).unwrap();
        let mut received = Vec::new();
        while let Some(byte) = rx.recv().await {
            received.push(byte);
        }

        // Assert
        assert_eq!(received, b"ls\r");
        handle.join().unwrap();
    }

    #[test]
    fn test_reader_stops_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handle = spawn_keystroke_reader(io::repeat(b'y'), tx).unwrap();

        // An endless input must not keep the thread alive once nobody listens.
        handle.join().unwrap();
    }
}
