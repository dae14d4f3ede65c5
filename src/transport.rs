//! The byte-channel contract the protocol engine requires, plus a real
//! serial-port backend and an in-memory one for tests.

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::TransportError;
use crate::protocol::{DLE, ETX, STX};

/// Maximum single-frame payload the driver will ever build or accept.
pub const MAX_PACKET_LENGTH: usize = 4096;

/// What the protocol engine needs from an underlying byte channel.
pub trait Transport {
    fn write_packet(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Reads one STX..ETX framed packet, honoring a read timeout on
    /// starvation. A standalone ETX terminates the frame only if the
    /// immediately preceding byte is not DLE.
    fn read_framed(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Reads exactly `n` bytes (used by the TVL transport variant, kept for
    /// compatibility with meters that speak the length-prefixed dialect).
    fn read_exact_n(&mut self, n: usize) -> Result<Vec<u8>, TransportError>;

    fn flush_input(&mut self) -> Result<(), TransportError>;
}

fn validate_payload(payload: &[u8]) -> Result<(), TransportError> {
    if payload.len() > MAX_PACKET_LENGTH {
        return Err(TransportError::PayloadTooLarge(payload.len()));
    }
    Ok(())
}

/// Serial-port backed transport. EDMI is 8N1 (unlike the IEC 62056-21
/// lineage this module's read loop is grounded on, which runs 7E1).
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(2000),
            write_timeout: Duration::from_millis(2000),
        }
    }
}

impl SerialTransport {
    pub fn open(settings: &SerialSettings) -> Result<Self, TransportError> {
        let port = serialport::new(&settings.port_name, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write_packet(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        validate_payload(payload)?;
        self.port.write_all(payload).map_err(TransportError::Io)
    }

    fn read_framed(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut buf = Vec::new();
        let mut in_frame = false;
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(TransportError::Timeout),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(TransportError::Timeout),
                Err(e) => return Err(TransportError::Io(e)),
            }
            let b = byte[0];
            if !in_frame {
                if b != STX {
                    continue;
                }
                in_frame = true;
            }
            buf.push(b);
            if buf.len() > 1 && b == ETX && buf[buf.len() - 2] != DLE {
                return Ok(buf);
            }
        }
    }

    fn read_exact_n(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; n];
        self.port.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut || e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::Timeout
            } else {
                TransportError::Io(e)
            }
        })?;
        Ok(buf)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }
}

/// In-memory duplex transport for tests: reads come from a preloaded queue
/// of response frames, writes are recorded for assertions.
#[cfg(any(test, feature = "test-support"))]
pub struct PipeTransport {
    pub written: Vec<Vec<u8>>,
    pub responses: std::collections::VecDeque<Vec<u8>>,
}

#[cfg(any(test, feature = "test-support"))]
impl PipeTransport {
    pub fn new() -> Self {
        Self {
            written: Vec::new(),
            responses: std::collections::VecDeque::new(),
        }
    }

    pub fn push_response(&mut self, frame: Vec<u8>) {
        self.responses.push_back(frame);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for PipeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Transport for PipeTransport {
    fn write_packet(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        validate_payload(payload)?;
        self.written.push(payload.to_vec());
        Ok(())
    }

    fn read_framed(&mut self) -> Result<Vec<u8>, TransportError> {
        self.responses.pop_front().ok_or(TransportError::Timeout)
    }

    fn read_exact_n(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let frame = self.responses.pop_front().ok_or(TransportError::Timeout)?;
        if frame.len() < n {
            return Err(TransportError::Timeout);
        }
        Ok(frame[..n].to_vec())
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.responses.clear();
        Ok(())
    }
}
