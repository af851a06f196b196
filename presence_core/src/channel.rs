//! Point-to-point line channel to the kiosk controller.
//!
//! The kiosk writes short text lines to the controller and reads `MODE:`
//! control lines back. [`ChannelConnector`] enumerates candidate
//! endpoints and opens one; the serial implementation probes the host's
//! serial ports.

use crate::{Error, Result};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Longest partial line kept while waiting for its newline
pub(crate) const MAX_PENDING_BYTES: usize = 1024;

/// A connected, line-oriented duplex channel
pub trait LineChannel {
    /// Endpoint this channel is connected to
    fn name(&self) -> &str;

    /// Write one line; `line` must already end in `\n`
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Drain every complete line currently buffered, without blocking
    fn drain_lines(&mut self) -> Result<Vec<String>>;
}

/// Enumerates and opens channel endpoints
pub trait ChannelConnector {
    fn endpoints(&self) -> Result<Vec<String>>;

    fn open(&self, endpoint: &str) -> Result<Box<dyn LineChannel>>;
}

/// Serial ports at a fixed baud rate
#[derive(Clone, Debug)]
pub struct SerialConnector {
    baud_rate: u32,
    timeout: Duration,
}

impl SerialConnector {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

impl ChannelConnector for SerialConnector {
    fn endpoints(&self) -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, endpoint: &str) -> Result<Box<dyn LineChannel>> {
        let port = serialport::new(endpoint, self.baud_rate)
            .timeout(self.timeout)
            .open()?;
        Ok(Box::new(SerialLineChannel {
            name: endpoint.to_owned(),
            port,
            pending: Vec::new(),
        }))
    }
}

/// A serial port with a partial-line read buffer
pub struct SerialLineChannel {
    name: String,
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl LineChannel for SerialLineChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.port
            .write_all(line.as_bytes())
            .and_then(|_| self.port.flush())
            .map_err(|e| Error::Channel(format!("write to {} failed: {}", self.name, e)))
    }

    fn drain_lines(&mut self) -> Result<Vec<String>> {
        let mut buf = [0u8; 256];
        while self.port.bytes_to_read()? > 0 {
            let n = self
                .port
                .read(&mut buf)
                .map_err(|e| Error::Channel(format!("read from {} failed: {}", self.name, e)))?;
            if n == 0 {
                break;
            }
            self.pending.extend_from_slice(&buf[..n]);
        }
        Ok(split_lines(&mut self.pending))
    }
}

/// Take every complete line out of `pending`, leaving a trailing partial
pub(crate) fn split_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = pending.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw).trim().to_owned();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if pending.len() > MAX_PENDING_BYTES {
        let excess = pending.len() - MAX_PENDING_BYTES;
        pending.drain(..excess);
        tracing::warn!("Dropped {} bytes of unterminated control input", excess);
    }
    lines
}
