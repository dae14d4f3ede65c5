//! Request builders and response parsers for each command the engine issues.

use crate::error::ProtocolError;
use crate::protocol::frame::{begin_init_packet, end_init_packet};
use crate::protocol::value::{self, EdmiDateTime, Value, ValueType};
use crate::protocol::{Command, CommandExtension, MULTI_ERR_IDEN};
use crate::registers::RegisterDescriptor;

/// A register paired with its decoded answer.
#[derive(Debug, Clone)]
pub struct DecodedRegister {
    pub descriptor: RegisterDescriptor,
    pub value: Option<Value>,
    pub error: ProtocolError,
}

// ---------------------------------------------------------------------
// LOGIN
// ---------------------------------------------------------------------

pub fn build_login(serial: u32, username: &str, password: &str) -> Vec<u8> {
    let mut packet = begin_init_packet(serial, Command::Login as u8, None);
    packet.extend_from_slice(username.as_bytes());
    packet.push(b',');
    packet.extend_from_slice(password.as_bytes());
    packet.push(0x00);
    end_init_packet(packet)
}

/// `payload` is the unstuffed, CRC-validated response frame. Success iff the
/// byte at offset 12 is ACK; any other content there is a login failure.
pub fn parse_login_answer(payload: &[u8]) -> ProtocolError {
    if payload.len() != 16 {
        return ProtocolError::ResponseWrongLength;
    }
    if payload[12] == crate::protocol::ResponseCode::Ack as u8 {
        ProtocolError::None
    } else {
        ProtocolError::LoginFailed
    }
}

// ---------------------------------------------------------------------
// READ_REGISTER_EXT
// ---------------------------------------------------------------------

pub fn build_read_registers(serial: u32, addresses: &[u32]) -> Vec<u8> {
    let mut packet = begin_init_packet(serial, Command::ReadRegisterExtended as u8, None);
    packet.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
    for &addr in addresses {
        packet.extend_from_slice(&addr.to_be_bytes());
    }
    end_init_packet(packet)
}

/// Parses a READ_REGISTER_EXT response, producing one [`DecodedRegister`]
/// per descriptor in `descriptors`, in order. Mirrors
/// `edmi_parse_read_registers_answer`'s cursor-advance rules exactly:
/// REGISTER_NOT_FOUND never advances past the (absent) value region; other
/// non-NONE errors advance only if the value region would fit.
pub fn parse_read_registers(
    payload: &[u8],
    descriptors: &[RegisterDescriptor],
) -> Result<Vec<DecodedRegister>, ProtocolError> {
    if payload.len() < 17 {
        return Err(ProtocolError::RequestWrongLength);
    }
    if payload[12] != Command::ReadRegisterExtended as u8 {
        return Err(ProtocolError::RequestResponseCommandMismatch);
    }
    let miden = u32::from_be_bytes(payload[13..17].try_into().unwrap());
    if miden != MULTI_ERR_IDEN {
        return Err(ProtocolError::RequestResponseCommandMismatch);
    }
    let data_end = payload.len() - 3;
    let mut idx = 17;
    let mut out = Vec::with_capacity(descriptors.len());

    for desc in descriptors {
        if idx >= data_end {
            return Err(ProtocolError::RequestWrongLength);
        }
        let error_byte = payload[idx];
        idx += 1;
        let error = ProtocolError::try_from(error_byte).unwrap_or(ProtocolError::UnimplementedDataType);

        let value = if error.is_none() {
            match desc.value_type {
                ValueType::String | ValueType::StringLong | ValueType::EfaString => {
                    if idx >= data_end {
                        return Err(ProtocolError::RequestWrongLength);
                    }
                    let (v, consumed) =
                        value::decode(desc.value_type, &payload[idx..data_end], desc.value_len)?;
                    idx += consumed;
                    Some(v)
                }
                _ => {
                    if idx + desc.value_len > data_end {
                        return Err(ProtocolError::RequestWrongLength);
                    }
                    let (v, consumed) =
                        value::decode(desc.value_type, &payload[idx..idx + desc.value_len], desc.value_len)?;
                    idx += consumed;
                    Some(v)
                }
            }
        } else if error == ProtocolError::RegisterNotFound {
            None
        } else {
            if idx + desc.value_len > data_end {
                return Err(error);
            }
            idx += desc.value_len;
            None
        };

        out.push(DecodedRegister {
            descriptor: *desc,
            value,
            error,
        });
    }

    Ok(out)
}

// ---------------------------------------------------------------------
// FILE_INFO / FILE_SEARCH / FILE_READ
// ---------------------------------------------------------------------

pub fn file_register_address(survey: u16) -> u32 {
    ((survey as u32) << 16) | crate::registers::profile_offsets::FILE_ADDR_BASE
}

pub fn build_file_info(serial: u32, survey: u16) -> Vec<u8> {
    let mut packet =
        begin_init_packet(serial, Command::FileAccess as u8, Some(CommandExtension::FileInfo));
    packet.extend_from_slice(&file_register_address(survey).to_be_bytes());
    end_init_packet(packet)
}

#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub start_record: i32,
    pub records_count: i32,
    pub record_size: i16,
    pub file_type: u8,
    pub name: String,
}

fn common_prefix(
    payload: &[u8],
    expected_ext: CommandExtension,
) -> Result<usize, ProtocolError> {
    let mut idx = 12;
    if payload.len() <= idx {
        return Err(ProtocolError::RequestWrongLength);
    }
    let result = payload[idx];
    idx += 1;
    if result == crate::protocol::ResponseCode::Can as u8 {
        if idx >= payload.len() {
            return Err(ProtocolError::RequestWrongLength);
        }
        return Err(ProtocolError::try_from(payload[idx])
            .unwrap_or(ProtocolError::RequestResponseCommandMismatch));
    }
    if result != Command::FileAccess as u8 {
        return Err(ProtocolError::RequestResponseCommandMismatch);
    }
    if idx >= payload.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    let ext = payload[idx];
    idx += 1;
    if ext != expected_ext as u8 {
        return Err(ProtocolError::RequestResponseCommandMismatch);
    }
    Ok(idx)
}

fn read_u32(buf: &[u8], idx: usize) -> Result<(u32, usize), ProtocolError> {
    if idx + 4 > buf.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    Ok((u32::from_be_bytes(buf[idx..idx + 4].try_into().unwrap()), idx + 4))
}

fn read_i32(buf: &[u8], idx: usize) -> Result<(i32, usize), ProtocolError> {
    if idx + 4 > buf.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    Ok((i32::from_be_bytes(buf[idx..idx + 4].try_into().unwrap()), idx + 4))
}

fn read_i16(buf: &[u8], idx: usize) -> Result<(i16, usize), ProtocolError> {
    if idx + 2 > buf.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    Ok((i16::from_be_bytes(buf[idx..idx + 2].try_into().unwrap()), idx + 2))
}

fn read_cstring(buf: &[u8], idx: usize, max_len: usize) -> Result<(String, usize), ProtocolError> {
    let remaining = buf.len().saturating_sub(idx);
    if remaining == 0 {
        return Err(ProtocolError::RequestWrongLength);
    }
    let scan_len = max_len.min(remaining);
    let window = &buf[idx..idx + scan_len];
    if let Some(pos) = window.iter().position(|&b| b == 0) {
        return Ok((
            String::from_utf8_lossy(&window[..pos]).to_string(),
            idx + pos + 1,
        ));
    }
    if remaining < max_len {
        return Err(ProtocolError::RequestWrongLength);
    }
    Ok((String::from_utf8_lossy(window).to_string(), idx + max_len))
}

fn read_datetime(buf: &[u8], idx: usize) -> Result<(EdmiDateTime, usize), ProtocolError> {
    if idx + 6 > buf.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    Ok((
        EdmiDateTime {
            day: buf[idx],
            month: buf[idx + 1],
            year: buf[idx + 2],
            hour: buf[idx + 3],
            minute: buf[idx + 4],
            second: buf[idx + 5],
        },
        idx + 6,
    ))
}

const MAX_VALUE_LENGTH: usize = 25;

pub fn parse_file_info(payload: &[u8]) -> Result<FileInfo, ProtocolError> {
    let mut idx = common_prefix(payload, CommandExtension::FileInfo)?;
    let (_, next) = read_u32(payload, idx)?;
    idx = next;
    let (start_record, next) = read_i32(payload, idx)?;
    idx = next;
    let (records_count, next) = read_i32(payload, idx)?;
    idx = next;
    let (record_size, next) = read_i16(payload, idx)?;
    idx = next;
    if idx >= payload.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    let file_type = payload[idx];
    idx += 1;
    let (name, _) = read_cstring(payload, idx, MAX_VALUE_LENGTH)?;

    Ok(FileInfo {
        start_record,
        records_count,
        record_size,
        file_type,
        name,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchDirection {
    Backward = 0,
    Forward = 1,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub start_record: i32,
    pub datetime: EdmiDateTime,
    pub dir_or_result: u8,
}

pub fn build_file_search(
    serial: u32,
    survey: u16,
    start_record: i32,
    dt: EdmiDateTime,
    direction: SearchDirection,
) -> Vec<u8> {
    let mut packet =
        begin_init_packet(serial, Command::FileAccess as u8, Some(CommandExtension::FileSearch));
    packet.extend_from_slice(&file_register_address(survey).to_be_bytes());
    packet.extend_from_slice(&start_record.to_be_bytes());
    packet.push(dt.day);
    packet.push(dt.month);
    packet.push(dt.year);
    packet.push(dt.hour);
    packet.push(dt.minute);
    packet.push(dt.second);
    packet.push(direction as u8);
    end_init_packet(packet)
}

pub fn parse_file_search(payload: &[u8]) -> Result<SearchResult, ProtocolError> {
    let mut idx = common_prefix(payload, CommandExtension::FileSearch)?;
    let (_, next) = read_u32(payload, idx)?;
    idx = next;
    let (start_record, next) = read_i32(payload, idx)?;
    idx = next;
    let (datetime, next) = read_datetime(payload, idx)?;
    idx = next;
    if idx >= payload.len() {
        return Err(ProtocolError::RequestWrongLength);
    }
    let dir_or_result = payload[idx];

    Ok(SearchResult {
        start_record,
        datetime,
        dir_or_result,
    })
}

pub fn build_file_read(
    serial: u32,
    survey: u16,
    start_record: i32,
    records_count: i16,
    record_offset: i16,
    record_size: i16,
) -> Vec<u8> {
    let mut packet =
        begin_init_packet(serial, Command::FileAccess as u8, Some(CommandExtension::FileRead));
    packet.extend_from_slice(&file_register_address(survey).to_be_bytes());
    packet.extend_from_slice(&start_record.to_be_bytes());
    packet.extend_from_slice(&records_count.to_be_bytes());
    packet.extend_from_slice(&record_offset.to_be_bytes());
    packet.extend_from_slice(&record_size.to_be_bytes());
    end_init_packet(packet)
}

#[derive(Debug, Clone, Default)]
pub struct ReadFileHeader {
    pub start_record: i32,
    pub records_count: i16,
    pub record_offset: i16,
    pub record_size: i16,
}

/// Parses a FILE_READ response. `channel_types` describes each channel's wire
/// type in order; `channels_count` may be recalibrated downward (by the
/// caller, via the returned `effective_channels`) if record 0 runs out of
/// room before filling every declared channel.
pub fn parse_file_read(
    payload: &[u8],
    channel_types: &[ValueType],
) -> Result<(ReadFileHeader, Vec<Value>, usize), ProtocolError> {
    if payload.len() < 3 {
        return Err(ProtocolError::RequestWrongLength);
    }
    let data_end = payload.len() - 3;
    let mut idx = common_prefix(payload, CommandExtension::FileRead)?;

    let (_, next) = read_u32(payload, idx)?;
    idx = next;
    let (start_record, next) = read_i32(payload, idx)?;
    idx = next;
    let (records_count, next) = read_i16(payload, idx)?;
    idx = next;
    let (record_offset, next) = read_i16(payload, idx)?;
    idx = next;
    let (record_size, next) = read_i16(payload, idx)?;
    idx = next;

    let header = ReadFileHeader {
        start_record,
        records_count,
        record_offset,
        record_size,
    };

    if header.records_count <= 0 {
        return Ok((header, Vec::new(), channel_types.len()));
    }

    let mut channels_per_record = channel_types.len();
    let mut fields = Vec::new();
    let mut effective_channels = channels_per_record;

    for record in 0..header.records_count {
        let record_end = if header.record_size > 0 {
            (idx + header.record_size as usize).min(data_end)
        } else {
            data_end
        };

        let mut ch = 0;
        while ch < channels_per_record {
            if header.record_size > 0 && idx >= record_end {
                channels_per_record = ch;
                if record == 0 {
                    effective_channels = channels_per_record;
                }
                break;
            }
            let vtype = channel_types[ch];
            if header.record_size > 0 {
                if let Some(expected_len) = value::fixed_width(vtype) {
                    if idx + expected_len > record_end {
                        channels_per_record = ch;
                        if record == 0 {
                            effective_channels = channels_per_record;
                        }
                        break;
                    }
                }
            }
            let (value, consumed) = value::decode(vtype, &payload[idx..record_end], 0)
                .map_err(|_| ProtocolError::UnimplementedDataType)?;
            idx += consumed;
            fields.push(value);
            ch += 1;
        }

        if header.record_size > 0 && idx < record_end {
            idx = record_end;
        }
    }

    Ok((header, fields, effective_channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{crc_hqx, stuff};
    use crate::protocol::ETX;
    use crate::registers::{PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE};

    fn unstuffed_response(serial: u32, body: &[u8]) -> Vec<u8> {
        let mut header = begin_init_packet(serial, 0, None);
        header.truncate(12); // STX..client_serial, drop command byte placeholder
        let mut frame = header;
        frame.extend_from_slice(body);
        let crc = crc_hqx(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame.push(ETX);
        frame
    }

    #[test]
    fn read_registers_three_floats() {
        let mut body = vec![b'M'];
        body.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
        for v in [230.0f32, 231.5, 229.25] {
            body.push(0x00);
            body.extend_from_slice(&v.to_be_bytes());
        }
        let payload = unstuffed_response(251308613, &body);
        let descs = [PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE];
        let regs = parse_read_registers(&payload, &descs).unwrap();
        assert_eq!(regs.len(), 3);
        assert_eq!(regs[0].value, Some(Value::F32(230.0)));
        assert_eq!(regs[1].value, Some(Value::F32(231.5)));
        assert_eq!(regs[2].value, Some(Value::F32(229.25)));
        for r in &regs {
            assert!(r.error.is_none());
        }
    }

    #[test]
    fn register_not_found_mid_batch_does_not_skip_bytes() {
        let mut body = vec![b'M'];
        body.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
        body.push(0x00);
        body.extend_from_slice(&230.0f32.to_be_bytes());
        body.push(0x03); // REGISTER_NOT_FOUND, no value bytes
        body.push(0x00);
        body.extend_from_slice(&229.25f32.to_be_bytes());

        let payload = unstuffed_response(1, &body);
        let descs = [PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE];
        let regs = parse_read_registers(&payload, &descs).unwrap();
        assert_eq!(regs[0].value, Some(Value::F32(230.0)));
        assert_eq!(regs[1].value, None);
        assert_eq!(regs[1].error, ProtocolError::RegisterNotFound);
        assert_eq!(regs[2].value, Some(Value::F32(229.25)));
    }

    #[test]
    fn login_packet_layout() {
        let packet = build_login(42, "EDMA", "IMDEIMDE");
        assert_eq!(packet[0], crate::protocol::STX);
        assert_eq!(packet[1], crate::protocol::E_FRAME);
    }
}
