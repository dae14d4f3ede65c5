//! A small representative register catalog.
//!
//! The source driver builds roughly fifty of these via one factory function
//! per register. This crate collapses that into a static table covering each
//! typed-value family at least once; a deployment's full catalog is expected
//! to be supplied by the host application, not by this crate.

use crate::protocol::value::ValueType;

/// Describes a named, addressable register: how to request it and how to
/// decode its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub address: u32,
    pub value_type: ValueType,
    pub value_len: usize,
}

impl RegisterDescriptor {
    pub const fn new(name: &'static str, address: u32, value_type: ValueType, value_len: usize) -> Self {
        Self {
            name,
            address,
            value_type,
            value_len,
        }
    }
}

pub const PHASE_A_VOLTAGE: RegisterDescriptor =
    RegisterDescriptor::new("Phase A Voltage", 0xE000, ValueType::Float, 4);
pub const PHASE_B_VOLTAGE: RegisterDescriptor =
    RegisterDescriptor::new("Phase B Voltage", 0xE001, ValueType::Float, 4);
pub const PHASE_C_VOLTAGE: RegisterDescriptor =
    RegisterDescriptor::new("Phase C Voltage", 0xE002, ValueType::Float, 4);

pub const PHASE_A_CURRENT: RegisterDescriptor =
    RegisterDescriptor::new("Phase A Current", 0xE010, ValueType::Float, 4);
pub const PHASE_B_CURRENT: RegisterDescriptor =
    RegisterDescriptor::new("Phase B Current", 0xE011, ValueType::Float, 4);
pub const PHASE_C_CURRENT: RegisterDescriptor =
    RegisterDescriptor::new("Phase C Current", 0xE012, ValueType::Float, 4);

pub const FREQUENCY: RegisterDescriptor =
    RegisterDescriptor::new("Frequency", 0xE060, ValueType::Float, 4);
pub const POWER_FACTOR: RegisterDescriptor =
    RegisterDescriptor::new("Power Factor", 0xE026, ValueType::PowerFactor, 4);

/// Double-precision accumulated energy; wire layout is raw i64 micropulses.
pub const TOTAL_IMPORT_KWH: RegisterDescriptor =
    RegisterDescriptor::new("Total Import kWh", 0x0069, ValueType::DoubleEnergy, 8);
pub const TOTAL_EXPORT_KWH: RegisterDescriptor =
    RegisterDescriptor::new("Total Export kWh", 0x0169, ValueType::DoubleEnergy, 8);

pub const METER_SERIAL_NUMBER: RegisterDescriptor =
    RegisterDescriptor::new("Meter Serial Number", 0xF002, ValueType::SerialNumber, 10);
pub const CURRENT_DATE: RegisterDescriptor =
    RegisterDescriptor::new("Current Date", 0xF010, ValueType::Date, 3);
pub const CURRENT_TIME: RegisterDescriptor =
    RegisterDescriptor::new("Current Time", 0xF011, ValueType::Time, 3);
pub const DATE_TIME: RegisterDescriptor =
    RegisterDescriptor::new("Date Time", 0xF03D, ValueType::DateTime, 6);

pub const ERROR_CODE: RegisterDescriptor =
    RegisterDescriptor::new("Error Code", 0xF016, ValueType::HexShort, 2);

/// Per-survey register offsets used by the profile engine (`src/profile.rs`).
pub mod profile_offsets {
    pub const FILE_ADDR_BASE: u32 = 0xF008;
    pub const INTERVAL_SECONDS: u32 = 0xF014;
    pub const CHANNELS_COUNT: u32 = 0xF012;

    pub const CHANNEL_TYPE_HIGH: u32 = 0xE2;
    pub const CHANNEL_UNIT_CODE_HIGH: u32 = 0xE3;
    pub const CHANNEL_SCALING_CODE_HIGH: u32 = 0xE6;
    pub const CHANNEL_SCALING_FACTOR_HIGH: u32 = 0xE8;
    pub const CHANNEL_NAME_HIGH: u32 = 0xE4;
}

/// A handful of named load-survey codes; more exist on real meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Survey {
    Ls01 = 0x0305,
    Ls02 = 0x0325,
    Ls03 = 0x0345,
    Ls04 = 0x0365,
    Ls05 = 0x0385,
}
