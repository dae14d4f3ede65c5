//! Client driver for the EDMI meter wire protocol.
//!
//! Login, register reads, and load-survey profile downloads, built around a
//! framed byte transport ([`transport::Transport`]) and a single-in-flight
//! request engine ([`protocol::session::Engine`]).

pub mod config;
pub mod error;
pub mod format;
pub mod profile;
pub mod protocol;
pub mod registers;
pub mod serial;
pub mod transport;

pub use error::{DriverError, DriverResult, ProtocolError, TransportError};
pub use protocol::commands::DecodedRegister;
pub use protocol::session::Engine;
pub use protocol::value::{EdmiDateTime, Value, ValueType};
pub use registers::{RegisterDescriptor, Survey};
pub use transport::{SerialSettings, SerialTransport, Transport};
