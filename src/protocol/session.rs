//! The session/protocol engine: wake-up + login, single-in-flight request
//! discipline, correlation checking.

use std::sync::Mutex;

use crate::error::{DriverError, DriverResult, ProtocolError};
use crate::protocol::commands::{self, DecodedRegister};
use crate::protocol::frame::{decode_frame, with_wake_up};
use crate::registers::RegisterDescriptor;
use crate::transport::Transport;

/// Owns one channel to one meter. Serializes operations with an internal
/// mutex so there is exactly one outstanding request at a time, matching
/// the source driver's `threading.Lock`-guarded `Media` class.
pub struct Engine<T: Transport> {
    transport: Mutex<T>,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    fn roundtrip(transport: &mut T, request: Vec<u8>) -> DriverResult<Vec<u8>> {
        transport.write_packet(&request)?;
        log::trace!("TX {} bytes", request.len());
        let raw = transport.read_framed()?;
        let payload = decode_frame(&raw).map_err(DriverError::from)?;
        log::trace!("RX {} bytes", payload.len());
        Ok(payload)
    }

    /// Authenticates against the meter. The wake-up sequence is prepended to
    /// the first framed request written on the channel.
    pub fn login(&self, meter_serial: u32, username: &str, password: &str) -> DriverResult<()> {
        let mut transport = self.transport.lock().expect("engine mutex poisoned");
        transport.flush_input()?;
        let login_packet = commands::build_login(meter_serial, username, password);
        let request = with_wake_up(&login_packet);
        let payload = Self::roundtrip(&mut transport, request)
            .map_err(|e| e.logged("login"))?;
        let err = commands::parse_login_answer(&payload);
        if err.is_none() {
            Ok(())
        } else {
            Err(DriverError::Protocol(err).logged("login"))
        }
    }

    /// Logs in (unless `do_login` is false) and reads the given registers.
    pub fn read_registers(
        &self,
        meter_serial: u32,
        username: &str,
        password: &str,
        descriptors: &[RegisterDescriptor],
        do_login: bool,
    ) -> DriverResult<Vec<DecodedRegister>> {
        let mut transport = self.transport.lock().expect("engine mutex poisoned");

        if do_login {
            let login_packet = commands::build_login(meter_serial, username, password);
            let request = with_wake_up(&login_packet);
            let payload = Self::roundtrip(&mut transport, request)
                .map_err(|e| e.logged("read_registers/login"))?;
            let err = commands::parse_login_answer(&payload);
            if !err.is_none() {
                return Err(DriverError::Protocol(err).logged("read_registers/login"));
            }
        }

        let addresses: Vec<u32> = descriptors.iter().map(|d| d.address).collect();
        let request = commands::build_read_registers(meter_serial, &addresses);
        let payload =
            Self::roundtrip(&mut transport, request).map_err(|e| e.logged("read_registers"))?;

        commands::parse_read_registers(&payload, descriptors)
            .map_err(|e| DriverError::Protocol(e).logged("read_registers"))
    }

    pub fn flush_input(&self) -> DriverResult<()> {
        let mut transport = self.transport.lock().expect("engine mutex poisoned");
        transport.flush_input().map_err(DriverError::from)
    }

    /// Runs a single request/response exchange, used internally by the
    /// profile engine which needs finer control than `read_registers`.
    pub(crate) fn exchange(&self, request: Vec<u8>) -> DriverResult<Vec<u8>> {
        let mut transport = self.transport.lock().expect("engine mutex poisoned");
        Self::roundtrip(&mut transport, request)
    }

    pub(crate) fn login_raw(&self, meter_serial: u32, username: &str, password: &str) -> DriverResult<()> {
        self.login(meter_serial, username, password)
    }
}

/// Convenience: map a raw u8 to `ProtocolError`, defaulting to a correlation
/// mismatch for genuinely unknown codes (mirrors the source's
/// `except ValueError: return REQUEST_RESPONSE_COMMAND_MISMATCH`).
pub(crate) fn error_from_byte(b: u8) -> ProtocolError {
    ProtocolError::try_from(b).unwrap_or(ProtocolError::RequestResponseCommandMismatch)
}
