//! Turns a decoded profile download into a sequence of per-record maps,
//! scaling each channel's raw value by its `ScalingFactor` and stamping
//! each record with a timestamp derived from the survey interval.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::profile::ProfileSpec;
use crate::protocol::value::{EdmiDateTime, Value, ValueType};
use crate::registers::Survey;

/// One formatted channel value. Strings and booleans stay as-is; every
/// numeric type is scaled by the channel's ScalingFactor, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(String),
    Date(String),
    Time(String),
    Null,
}

/// One formatted record: record number, timestamp, and one named entry per
/// channel.
#[derive(Debug, Clone)]
pub struct FormattedRecord {
    pub record_number: i32,
    pub timestamp: Option<NaiveDateTime>,
    pub channels: BTreeMap<String, FormattedValue>,
}

fn edmi_to_naive_datetime(dt: &EdmiDateTime) -> Option<NaiveDateTime> {
    if dt.year == 0 && dt.month == 0 && dt.day == 0 {
        return None;
    }
    let year = 2000 + dt.year as i32;
    NaiveDate::from_ymd_opt(year, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)
}

fn format_edmi_date(dt: &EdmiDateTime) -> Option<String> {
    edmi_to_naive_datetime(dt).map(|d| d.date().to_string())
}

fn format_edmi_time(dt: &EdmiDateTime) -> String {
    format!("{:02}:{:02}:{:02}", dt.hour, dt.minute, dt.second)
}

fn format_edmi_datetime(dt: &EdmiDateTime) -> Option<String> {
    if dt.year == 0 && dt.month == 0 && dt.day == 0 {
        return Some(format_edmi_time(dt));
    }
    edmi_to_naive_datetime(dt).map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn scaled(value: f64, factor: Option<f32>) -> f64 {
    match factor {
        Some(f) => value * f as f64,
        None => value,
    }
}

/// Applies a channel's wire type and scaling factor to a raw decoded value.
/// FLOAT_ENERGY/DOUBLE_ENERGY arrive as raw micropulse integers and are
/// scaled the same as any other numeric register.
fn format_channel_value(raw: &Value, vtype: ValueType, scaling_factor: Option<f32>) -> FormattedValue {
    use ValueType::*;
    match (vtype, raw) {
        (Boolean, Value::Bool(b)) => FormattedValue::Bool(*b),
        (Byte, Value::U8(v)) => FormattedValue::Int(*v as i64),
        (String | StringLong | EfaString | ErrorString, Value::Str(s)) => FormattedValue::Text(s.clone()),
        (DateTime, Value::DateTime(dt)) => match format_edmi_datetime(dt) {
            Some(s) => FormattedValue::Timestamp(s),
            None => FormattedValue::Null,
        },
        (Date, Value::Date(dt)) => match format_edmi_date(dt) {
            Some(s) => FormattedValue::Date(s),
            None => FormattedValue::Null,
        },
        (Time, Value::Time(dt)) => FormattedValue::Time(format_edmi_time(dt)),
        (FloatEnergy, Value::EnergyI32(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (DoubleEnergy, Value::EnergyI64(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (Float | PowerFactor, Value::F32(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (Double, Value::F64(v)) => FormattedValue::Float(scaled(*v, scaling_factor)),
        (Short, Value::I16(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (HexShort, Value::U16(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (Long, Value::I32(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (HexLong | RegisterNumberHexLong, Value::U32(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        (LongLong, Value::I64(v)) => FormattedValue::Float(scaled(*v as f64, scaling_factor)),
        _ => FormattedValue::Null,
    }
}

/// Expands a flat `fields` array (channel-major within each record) into one
/// [`FormattedRecord`] per record, applying each channel's scaling and the
/// LS03 survey's extra correction factor.
pub fn format_parsed_profile_data(spec: &ProfileSpec, fields: &[Value]) -> Vec<FormattedRecord> {
    if spec.channels_count == 0 {
        return Vec::new();
    }

    let records_count = if spec.records_count > 0 {
        spec.records_count as usize
    } else {
        fields.len() / spec.channels_count
    };

    let start_dt = edmi_to_naive_datetime(&spec.from_datetime);
    let mut out = Vec::with_capacity(records_count);
    let mut idx = 0usize;

    for record_idx in 0..records_count {
        let timestamp = match start_dt {
            None => None,
            Some(base) if spec.interval > 0 => base.checked_add_signed(Duration::seconds(
                spec.interval as i64 * record_idx as i64,
            )),
            Some(base) => Some(base),
        };

        let mut channels = BTreeMap::new();
        for ch in 0..spec.channels_count {
            if idx >= fields.len() {
                break;
            }
            let raw = &fields[idx];
            idx += 1;
            let Some(ch_info) = spec.channels_info.get(ch) else {
                continue;
            };
            let vtype = match ValueType::try_from(ch_info.value_type) {
                Ok(t) => t,
                Err(_) => continue,
            };
            let mut scaling = ch_info.scaling_factor;
            if spec.survey == Survey::Ls03 as u16 {
                if let Some(f) = scaling {
                    scaling = Some(f * 0.001344);
                }
            }
            channels.insert(ch_info.name.clone(), format_channel_value(raw, vtype, scaling));
        }

        out.push(FormattedRecord {
            record_number: spec.start_record + record_idx as i32,
            timestamp,
            channels,
        });
    }

    out
}
