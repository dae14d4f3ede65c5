//! Error taxonomy for the EDMI protocol driver.
//!
//! Two independent failure kinds: [`ProtocolError`] carries the meter's own
//! 19-code error taxonomy (wire byte <-> variant is lossless), [`TransportError`]
//! carries everything below the protocol layer (timeouts, I/O, closed ports).
//! [`DriverError`] is the top-level type every public operation returns.

use std::fmt;

/// The EDMI error taxonomy, shared between per-register errors and
/// engine-level protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolError {
    None = 0x00,
    CanNotWrite = 0x01,
    UnimplementedOperation = 0x02,
    RegisterNotFound = 0x03,
    AccessDenied = 0x04,
    RequestWrongLength = 0x05,
    BadTypeCodeInternalError = 0x06,
    DataNotReadyYet = 0x07,
    OutOfRange = 0x08,
    NotLoggedIn = 0x09,
    RequestCrcError = 0x0A,
    ResponseCrcError = 0x0B,
    RequestResponseCommandMismatch = 0x0C,
    RequestResponseRegisterMismatch = 0x0D,
    LoginFailed = 0x0E,
    LogoutFailed = 0x0F,
    GetMeterAttentionFailed = 0x10,
    ResponseWrongLength = 0x11,
    UnimplementedDataType = 0x12,
}

impl ProtocolError {
    pub fn is_none(self) -> bool {
        matches!(self, ProtocolError::None)
    }
}

impl TryFrom<u8> for ProtocolError {
    type Error = u8;

    fn try_from(b: u8) -> Result<Self, u8> {
        use ProtocolError::*;
        Ok(match b {
            0x00 => None,
            0x01 => CanNotWrite,
            0x02 => UnimplementedOperation,
            0x03 => RegisterNotFound,
            0x04 => AccessDenied,
            0x05 => RequestWrongLength,
            0x06 => BadTypeCodeInternalError,
            0x07 => DataNotReadyYet,
            0x08 => OutOfRange,
            0x09 => NotLoggedIn,
            0x0A => RequestCrcError,
            0x0B => ResponseCrcError,
            0x0C => RequestResponseCommandMismatch,
            0x0D => RequestResponseRegisterMismatch,
            0x0E => LoginFailed,
            0x0F => LogoutFailed,
            0x10 => GetMeterAttentionFailed,
            0x11 => ResponseWrongLength,
            0x12 => UnimplementedDataType,
            other => return Err(other),
        })
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolError::None => "no error",
            ProtocolError::CanNotWrite => "meter refused write",
            ProtocolError::UnimplementedOperation => "command unknown to meter",
            ProtocolError::RegisterNotFound => "register address not found",
            ProtocolError::AccessDenied => "access denied",
            ProtocolError::RequestWrongLength => "local length check failed",
            ProtocolError::BadTypeCodeInternalError => "bad type code (internal error)",
            ProtocolError::DataNotReadyYet => "data not ready yet",
            ProtocolError::OutOfRange => "value out of range",
            ProtocolError::NotLoggedIn => "not logged in",
            ProtocolError::RequestCrcError => "meter reported bad request CRC",
            ProtocolError::ResponseCrcError => "response CRC mismatch",
            ProtocolError::RequestResponseCommandMismatch => "response command did not match request",
            ProtocolError::RequestResponseRegisterMismatch => "response register did not match request",
            ProtocolError::LoginFailed => "login failed",
            ProtocolError::LogoutFailed => "logout failed",
            ProtocolError::GetMeterAttentionFailed => "wake-up sequence failed",
            ProtocolError::ResponseWrongLength => "response frame had the wrong length",
            ProtocolError::UnimplementedDataType => "unknown wire value type code",
        };
        f.write_str(s)
    }
}

impl std::error::Error for ProtocolError {}

/// Failures below the protocol layer: the channel itself, not the meter's answer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("serial read/write timed out")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("port is not open")]
    PortClosed,
    #[error("payload too large for a single frame ({0} bytes)")]
    PayloadTooLarge(usize),
}

/// Top-level error returned by every public driver operation.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for DriverError {
    fn from(e: ProtocolError) -> Self {
        DriverError::Protocol(e)
    }
}

impl DriverError {
    /// Logs this error at `warn` before returning it to the caller, so a
    /// host application gets a trail even if it discards the `Result`.
    pub fn logged(self, operation: &str) -> Self {
        log::warn!("{operation} failed: {self}");
        self
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
