//! Serial Link backed by the `serialport` crate.
//!
//! [`SerialLink`] owns the device handle.  At startup it is split into a
//! [`SerialLinkReader`] for the uplink pump and a [`SerialLinkWriter`] for the
//! downlink pump; the writer uses a cloned OS handle (`try_clone`), so the two
//! halves never share a Rust value and the kernel serialises access to the
//! device.
//!
//! # Portability note
//!
//! `serialport` talks to termios on Unix and the COMM API on Windows.  The
//! device path is whatever the platform uses (`/dev/ttyS1`, `/dev/ttyUSB0`,
//! `COM3`).

use std::io::{ErrorKind, Read, Write};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::application::ports::{LinkError, SerialReader, SerialWriter};
use crate::domain::SerialSettings;

/// The open serial device.
///
/// At most one handle is held at a time: [`SerialLink::reopen`] closes the
/// current handle before opening the new one.
pub struct SerialLink {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    /// Opens `path` at the configured bit rate with 8N1 framing and no flow
    /// control.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Unavailable`] if the device cannot be opened
    /// (missing node, permission denied, already locked).
    pub fn open(path: &str, settings: &SerialSettings) -> Result<Self, LinkError> {
        let port = open_port(path, settings)?;
        info!("serial link open: {path} @ {} baud", settings.baud_rate);
        Ok(Self {
            path: path.to_string(),
            port: Some(port),
        })
    }

    /// Closes the current handle and opens `path` with `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Unavailable`] if the new device cannot be opened;
    /// the link is left closed in that case.
    pub fn reopen(&mut self, path: &str, settings: &SerialSettings) -> Result<(), LinkError> {
        self.close();
        self.port = Some(open_port(path, settings)?);
        self.path = path.to_string();
        info!("serial link reopened: {path} @ {} baud", settings.baud_rate);
        Ok(())
    }

    /// Closes the device.  Closing an already-closed link is a no-op.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            info!("serial link closed: {}", self.path);
        }
    }

    /// Returns `true` while a handle is held.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Returns the device path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Splits the link into an independently owned reader and writer.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Unavailable`] if the link is closed, or
    /// [`LinkError::Io`] if the OS handle cannot be duplicated.
    pub fn split(mut self) -> Result<(SerialLinkReader, SerialLinkWriter), LinkError> {
        let port = self.port.take().ok_or_else(|| LinkError::Unavailable {
            path: self.path.clone(),
            reason: "link is closed".to_string(),
        })?;
        let write_port = port.try_clone().map_err(std::io::Error::from)?;

        Ok((
            SerialLinkReader { port },
            SerialLinkWriter { port: write_port },
        ))
    }
}

fn open_port(path: &str, settings: &SerialSettings) -> Result<Box<dyn SerialPort>, LinkError> {
    serialport::new(path, settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(settings.read_timeout)
        .open()
        .map_err(|e| LinkError::Unavailable {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

/// Read half of the serial link.
pub struct SerialLinkReader {
    port: Box<dyn SerialPort>,
}

impl SerialReader for SerialLinkReader {
    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let waiting = self.port.bytes_to_read().map_err(std::io::Error::from)?;
        Ok(waiting as usize)
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>, LinkError> {
        let mut buf = vec![0u8; max];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // The driver timeout elapsed with nothing to return.
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write half of the serial link.
pub struct SerialLinkWriter {
    port: Box<dyn SerialPort>,
}

impl SerialWriter for SerialLinkWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
        // `write_all` loops over partial writes so one envelope is never
        // split across calls from the caller's point of view.
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(bytes.len())
    }
}
