//! Load-survey profile download: metadata discovery, timestamp search, and
//! chunked bulk read with an adaptive per-read record limit.
//!
//! This is a close port of the source driver's `Media.edmi_read_profile`
//! control flow: its `_search`/`_read_records` closures become private
//! methods here, and the `nonlocal first_err` becomes an explicit
//! accumulator threaded through the call chain.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{DriverError, DriverResult, ProtocolError};
use crate::protocol::commands::{self, FileInfo, SearchDirection};
use crate::protocol::session::Engine;
use crate::protocol::value::{EdmiDateTime, Value, ValueType};
use crate::registers::{profile_offsets, RegisterDescriptor, Survey};
use crate::transport::Transport;

#[derive(Debug, Clone, Default)]
pub struct FileChannelInfo {
    pub value_type: u8,
    pub unit_code: u8,
    pub scaling_code: u8,
    pub scaling_factor: Option<f32>,
    pub name: String,
}

pub const MAX_CHANNELS_COUNT: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct ProfileSpec {
    pub survey: u16,
    pub interval: i32,
    pub from_datetime: EdmiDateTime,
    pub to_datetime: EdmiDateTime,
    pub start_record: i32,
    pub records_count: i32,
    pub channels_count: usize,
    pub channels_info: Vec<FileChannelInfo>,
    pub name: String,
}

/// Key for the learned per-read record-count cache: survey, record size,
/// and channel count together determine how many records fit in one reply.
type CacheKey = (u16, i16, usize);

/// Coerce a `chrono::NaiveDateTime`-like caller-supplied value into the wire
/// date/time fields. `Year = value.year % 100`, matching `edmi_coerce_datetime`.
pub fn coerce_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> EdmiDateTime {
    EdmiDateTime {
        year: (year.rem_euclid(100)) as u8,
        month: month as u8,
        day: day as u8,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
    }
}

fn channel_value_type(raw: u8) -> ValueType {
    ValueType::try_from(raw).unwrap_or(ValueType::Float)
}

/// Runs the full profile download state machine against `engine`.
///
/// Mirrors `Media.edmi_read_profile`: metadata failures in the info-register
/// and per-channel steps are accumulated into `first_err` while execution
/// continues; FILE_INFO, SEARCH, and READ failures abort immediately.
pub struct ProfileEngine<'a, T: Transport> {
    engine: &'a Engine<T>,
    read_limit_cache: Mutex<HashMap<CacheKey, i16>>,
}

impl<'a, T: Transport> ProfileEngine<'a, T> {
    pub fn new(engine: &'a Engine<T>) -> Self {
        Self {
            engine,
            read_limit_cache: Mutex::new(HashMap::new()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn read_profile(
        &self,
        meter_serial: u32,
        username: &str,
        password: &str,
        survey: u16,
        from_dt: EdmiDateTime,
        to_dt: EdmiDateTime,
        max_records: Option<i32>,
        do_login: bool,
        mut progress_cb: Option<&mut dyn FnMut(i32, i32)>,
    ) -> (ProfileSpec, Vec<Value>, ProtocolError) {
        let mut spec = ProfileSpec {
            survey,
            ..Default::default()
        };
        let mut first_err = ProtocolError::None;

        if do_login {
            if let Err(e) = self.engine.login_raw(meter_serial, username, password) {
                return (spec, Vec::new(), protocol_error_of(e));
            }
        }

        // 1. Info registers (interval, channels_count).
        let info_regs = [
            RegisterDescriptor::new(
                "Profile Interval",
                ((survey as u32) << 16) | profile_offsets::INTERVAL_SECONDS,
                ValueType::Long,
                4,
            ),
            RegisterDescriptor::new(
                "Profile Channels Count",
                ((survey as u32) << 16) | profile_offsets::CHANNELS_COUNT,
                ValueType::Byte,
                1,
            ),
        ];
        let addresses: Vec<u32> = info_regs.iter().map(|d| d.address).collect();
        let request = commands::build_read_registers(meter_serial, &addresses);
        let payload = match self.engine.exchange(request) {
            Ok(p) => p,
            Err(e) => return (spec, Vec::new(), protocol_error_of(e)),
        };
        let decoded = match commands::parse_read_registers(&payload, &info_regs) {
            Ok(d) => d,
            Err(e) => {
                first_err = e;
                Vec::new()
            }
        };

        let mut interval: i32 = 0;
        let mut channels_count_from_info: usize = 0;
        if decoded.len() == 2 {
            if !decoded[0].error.is_none() {
                if first_err.is_none() {
                    first_err = decoded[0].error;
                }
            } else if let Some(Value::I32(v)) = decoded[0].value {
                interval = v;
            }
            if !decoded[1].error.is_none() {
                if first_err.is_none() {
                    first_err = decoded[1].error;
                }
                if decoded[1].error == ProtocolError::RegisterNotFound {
                    let mut cache = self.read_limit_cache.lock().unwrap();
                    cache.retain(|k, _| k.0 != survey);
                    return (spec, Vec::new(), decoded[1].error);
                }
            } else if let Some(Value::U8(v)) = decoded[1].value {
                channels_count_from_info = v as usize + 1;
            }
        }

        // 2. FILE_INFO.
        let request = commands::build_file_info(meter_serial, survey);
        let payload = match self.engine.exchange(request) {
            Ok(p) => p,
            Err(e) => return (spec, Vec::new(), protocol_error_of(e)),
        };
        let file_info: FileInfo = match commands::parse_file_info(&payload) {
            Ok(fi) => fi,
            Err(e) => return (spec, Vec::new(), e),
        };

        log::info!(
            "FILE_INFO survey=0x{:04X} start={} records={} size={} interval={} channels={}",
            survey,
            file_info.start_record,
            file_info.records_count,
            file_info.record_size,
            interval,
            channels_count_from_info
        );

        // 3. Per-channel descriptors.
        let mut channels: Vec<FileChannelInfo> = Vec::new();
        if channels_count_from_info > 0 {
            for ch in 0..channels_count_from_info {
                let ch_regs = channel_registers(survey, ch as u32);
                let addresses: Vec<u32> = ch_regs.iter().map(|d| d.address).collect();
                let request = commands::build_read_registers(meter_serial, &addresses);
                let payload = match self.engine.exchange(request) {
                    Ok(p) => p,
                    Err(e) => return (spec, Vec::new(), protocol_error_of(e)),
                };
                let decoded = match commands::parse_read_registers(&payload, &ch_regs) {
                    Ok(d) => d,
                    Err(e) => {
                        if first_err.is_none() {
                            first_err = e;
                        }
                        continue;
                    }
                };
                let mut info = FileChannelInfo::default();
                for (i, reg) in decoded.iter().enumerate() {
                    if !reg.error.is_none() {
                        if first_err.is_none() {
                            first_err = reg.error;
                        }
                        continue;
                    }
                    match (i, &reg.value) {
                        (0, Some(Value::U8(v))) => info.value_type = *v,
                        (1, Some(Value::U8(v))) => info.unit_code = *v,
                        (2, Some(Value::U8(v))) => info.scaling_code = *v,
                        (3, Some(Value::F32(v))) => info.scaling_factor = Some(*v),
                        (4, Some(Value::Str(v))) => info.name = v.clone(),
                        _ => {}
                    }
                }
                channels.push(info);
            }
        }

        spec.interval = if interval != 0 { interval } else { spec.interval };
        spec.channels_count = if channels_count_from_info > 0 {
            channels_count_from_info
        } else {
            channels.len()
        };
        if !channels.is_empty() {
            spec.channels_info = channels;
        }
        if !file_info.name.is_empty() {
            spec.name = file_info.name.clone();
        }

        // 4. SEARCH from / to.
        let from_search = match self.search(meter_serial, survey, file_info.start_record, from_dt, &mut first_err) {
            Ok(s) => s,
            Err(e) => return (spec, Vec::new(), e),
        };
        let to_search = match self.search(meter_serial, survey, file_info.start_record, to_dt, &mut first_err) {
            Ok(s) => s,
            Err(e) => return (spec, Vec::new(), e),
        };

        let mut record_count = to_search.start_record - from_search.start_record + 1;
        if record_count < 1 {
            record_count = 1;
        }
        if let Some(max) = max_records {
            record_count = record_count.min(max);
        }

        let channel_types: Vec<ValueType> = spec
            .channels_info
            .iter()
            .map(|c| channel_value_type(c.value_type))
            .collect();

        let (fields, effective_channels, err) = self.read_records(
            meter_serial,
            survey,
            file_info.record_size,
            from_search.start_record,
            record_count,
            record_count,
            interval,
            &channel_types,
            &mut progress_cb,
        );

        if effective_channels != spec.channels_count && effective_channels > 0 {
            spec.channels_count = effective_channels;
        }

        if !err.is_none() {
            let final_err = if !first_err.is_none() { first_err } else { err };
            return (spec, fields, final_err);
        }

        if spec.channels_count == 0 {
            return (spec, fields, ProtocolError::RequestWrongLength);
        }

        spec.start_record = from_search.start_record;
        spec.from_datetime = from_dt;
        spec.to_datetime = to_search.datetime;
        spec.records_count = (fields.len() / spec.channels_count) as i32;

        let final_err = if !first_err.is_none() { first_err } else { ProtocolError::None };
        (spec, fields, final_err)
    }

    fn search(
        &self,
        meter_serial: u32,
        survey: u16,
        start_record: i32,
        dt: EdmiDateTime,
        first_err: &mut ProtocolError,
    ) -> DriverResult<commands::SearchResult> {
        let packet = commands::build_file_search(
            meter_serial,
            survey,
            start_record,
            dt,
            SearchDirection::Backward,
        );
        let payload = self.engine.exchange(packet)?;
        match commands::parse_file_search(&payload) {
            Ok(result) => {
                log::info!(
                    "FILE_SEARCH dt={:?} start={} result={}",
                    result.datetime,
                    result.start_record,
                    result.dir_or_result
                );
                Ok(result)
            }
            Err(e) => {
                if first_err.is_none() {
                    *first_err = e;
                }
                Err(DriverError::Protocol(e))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_records(
        &self,
        meter_serial: u32,
        survey: u16,
        record_size: i16,
        start_record: i32,
        count: i32,
        total_records: i32,
        interval: i32,
        channel_types: &[ValueType],
        progress_cb: &mut Option<&mut dyn FnMut(i32, i32)>,
    ) -> (Vec<Value>, usize, ProtocolError) {
        let cache_key: CacheKey = (survey, record_size, channel_types.len());
        let cached_limit = self.read_limit_cache.lock().unwrap().get(&cache_key).copied();

        let mut per_read_limit: i16 = if survey == Survey::Ls01 as u16 {
            59
        } else if survey == Survey::Ls03 as u16 {
            288
        } else if interval > 0 {
            (((86_400 + interval - 1) / interval).max(1)) as i16
        } else {
            48
        };
        if let Some(cached) = cached_limit {
            per_read_limit = per_read_limit.min(cached);
        }

        let mut fields_all = Vec::new();
        let mut remaining = count;
        let mut next_start = start_record;
        let mut records_read = 0;
        let mut effective_channels = channel_types.len();

        while remaining > 0 {
            let chunk = remaining.min(per_read_limit as i32) as i16;
            log::info!(
                "FILE_READ start={} count={} size={}",
                next_start,
                chunk,
                record_size
            );
            let packet = commands::build_file_read(meter_serial, survey, next_start, chunk, 0, record_size);
            let payload = match self.engine.exchange(packet) {
                Ok(p) => p,
                Err(e) => return (fields_all, effective_channels, protocol_error_of(e)),
            };
            let (header, fields, eff) = match commands::parse_file_read(&payload, channel_types) {
                Ok(r) => r,
                Err(e) => return (fields_all, effective_channels, e),
            };
            effective_channels = eff;

            if header.records_count > 0 && header.records_count < chunk {
                per_read_limit = per_read_limit.min(header.records_count);
                self.read_limit_cache.lock().unwrap().insert(cache_key, per_read_limit);
                log::info!("FILE_READ_LIMIT learned={} key={:?}", per_read_limit, cache_key);
            }

            if effective_channels == 0 {
                return (fields_all, effective_channels, ProtocolError::RequestWrongLength);
            }
            let records_returned = fields.len() / effective_channels;
            fields_all.extend(fields);
            if records_returned == 0 {
                return (fields_all, effective_channels, ProtocolError::ResponseWrongLength);
            }
            records_read += records_returned as i32;
            if let Some(cb) = progress_cb.as_mut() {
                cb(records_read, total_records);
            }
            remaining -= records_returned as i32;
            next_start += records_returned as i32;
        }

        (fields_all, effective_channels, ProtocolError::None)
    }
}

fn channel_registers(survey: u16, channel: u32) -> [RegisterDescriptor; 5] {
    let mask = (survey as u32) << 16;
    let addr = |high: u32| mask | ((high << 8) | (channel & 0xFF));
    [
        RegisterDescriptor::new("Channel Type", addr(profile_offsets::CHANNEL_TYPE_HIGH), ValueType::Byte, 1),
        RegisterDescriptor::new(
            "Channel UnitCode",
            addr(profile_offsets::CHANNEL_UNIT_CODE_HIGH),
            ValueType::Byte,
            1,
        ),
        RegisterDescriptor::new(
            "Channel ScalingCode",
            addr(profile_offsets::CHANNEL_SCALING_CODE_HIGH),
            ValueType::Byte,
            1,
        ),
        RegisterDescriptor::new(
            "Channel ScalingFactor",
            addr(profile_offsets::CHANNEL_SCALING_FACTOR_HIGH),
            ValueType::Float,
            4,
        ),
        RegisterDescriptor::new("Channel Name", addr(profile_offsets::CHANNEL_NAME_HIGH), ValueType::String, 25),
    ]
}

fn protocol_error_of(e: DriverError) -> ProtocolError {
    match e {
        DriverError::Protocol(p) => p,
        DriverError::Transport(_) => ProtocolError::ResponseWrongLength,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_datetime_wraps_year() {
        let dt = coerce_datetime(2026, 1, 18, 0, 30, 0);
        assert_eq!(dt.year, 26);
        assert_eq!(dt.month, 1);
        assert_eq!(dt.day, 18);
    }

    #[test]
    fn coerce_datetime_handles_year_2000() {
        let dt = coerce_datetime(2000, 6, 1, 12, 0, 0);
        assert_eq!(dt.year, 0);
    }
}
