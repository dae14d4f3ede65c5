//! The EDMI typed value set: wire layout and decoded representation.

use crate::error::ProtocolError;

/// One-byte ASCII-coded wire type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    String = b'A',
    Boolean = b'B',
    Byte = b'C',
    Double = b'D',
    EfaString = b'E',
    Float = b'F',
    StringLong = b'G',
    HexShort = b'H',
    Short = b'I',
    VariableSpace = b'J',
    Long = b'L',
    SerialNumber = b'M',
    NoneType = b'N',
    FloatEnergy = b'O',
    PowerFactor = b'P',
    Time = b'Q',
    Date = b'R',
    Special = b'S',
    DateTime = b'T',
    DoubleEnergy = b'U',
    LongLong = b'V',
    Waveform = b'W',
    HexLong = b'X',
    ErrorString = b'K',
    RegisterNumberHexLong = b'Z',
}

impl TryFrom<u8> for ValueType {
    type Error = ProtocolError;

    fn try_from(b: u8) -> Result<Self, ProtocolError> {
        use ValueType::*;
        Ok(match b {
            b'A' => String,
            b'B' => Boolean,
            b'C' => Byte,
            b'D' => Double,
            b'E' => EfaString,
            b'F' => Float,
            b'G' => StringLong,
            b'H' => HexShort,
            b'I' => Short,
            b'J' => VariableSpace,
            b'L' => Long,
            b'M' => SerialNumber,
            b'N' => NoneType,
            b'O' => FloatEnergy,
            b'P' => PowerFactor,
            b'Q' => Time,
            b'R' => Date,
            b'S' => Special,
            b'T' => DateTime,
            b'U' => DoubleEnergy,
            b'V' => LongLong,
            b'W' => Waveform,
            b'X' => HexLong,
            b'K' => ErrorString,
            b'Z' => RegisterNumberHexLong,
            _ => return Err(ProtocolError::UnimplementedDataType),
        })
    }
}

/// A decoded EDMI date, time, or date-time. Year is the wire byte (0-99); the
/// external year is `2000 + Year` — callers that need a `chrono` type should
/// add 2000 themselves (kept here as the raw wire field per spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdmiDateTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// A decoded register/field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// FLOAT_ENERGY: raw micropulse count (external value = scaled float).
    EnergyI32(i32),
    /// DOUBLE_ENERGY: raw micropulse count (external value = scaled double).
    EnergyI64(i64),
    Date(EdmiDateTime),
    Time(EdmiDateTime),
    DateTime(EdmiDateTime),
    Str(String),
    SerialNumber(String),
}

const MAX_VALUE_LENGTH: usize = 25;

/// Decode a value of `vtype` from `buf[0..]`. Returns the decoded value and
/// the number of bytes consumed. `value_len` bounds string scanning.
pub fn decode(
    vtype: ValueType,
    buf: &[u8],
    value_len: usize,
) -> Result<(Value, usize), ProtocolError> {
    use ValueType::*;
    match vtype {
        Byte | Boolean => {
            if buf.is_empty() {
                return Err(ProtocolError::RequestWrongLength);
            }
            let v = buf[0];
            Ok((
                if vtype == Boolean {
                    Value::Bool(v != 0)
                } else {
                    Value::U8(v)
                },
                1,
            ))
        }
        Short => take(buf, 2).map(|b| (Value::I16(i16::from_be_bytes(b.try_into().unwrap())), 2)),
        HexShort => take(buf, 2).map(|b| (Value::U16(u16::from_be_bytes(b.try_into().unwrap())), 2)),
        Long => take(buf, 4).map(|b| (Value::I32(i32::from_be_bytes(b.try_into().unwrap())), 4)),
        HexLong | RegisterNumberHexLong => {
            take(buf, 4).map(|b| (Value::U32(u32::from_be_bytes(b.try_into().unwrap())), 4))
        }
        LongLong => take(buf, 8).map(|b| (Value::I64(i64::from_be_bytes(b.try_into().unwrap())), 8)),
        Float | PowerFactor => {
            take(buf, 4).map(|b| (Value::F32(f32::from_be_bytes(b.try_into().unwrap())), 4))
        }
        Double => take(buf, 8).map(|b| (Value::F64(f64::from_be_bytes(b.try_into().unwrap())), 8)),
        FloatEnergy => take(buf, 4).map(|b| (Value::EnergyI32(i32::from_be_bytes(b.try_into().unwrap())), 4)),
        DoubleEnergy => take(buf, 8).map(|b| (Value::EnergyI64(i64::from_be_bytes(b.try_into().unwrap())), 8)),
        Date => take(buf, 3).map(|b| {
            (
                Value::Date(EdmiDateTime {
                    day: b[0],
                    month: b[1],
                    year: b[2],
                    ..Default::default()
                }),
                3,
            )
        }),
        Time => take(buf, 3).map(|b| {
            (
                Value::Time(EdmiDateTime {
                    hour: b[0],
                    minute: b[1],
                    second: b[2],
                    ..Default::default()
                }),
                3,
            )
        }),
        DateTime => take(buf, 6).map(|b| {
            (
                Value::DateTime(EdmiDateTime {
                    day: b[0],
                    month: b[1],
                    year: b[2],
                    hour: b[3],
                    minute: b[4],
                    second: b[5],
                }),
                6,
            )
        }),
        ErrorString => take(buf, 16).map(|b| {
            (
                Value::Str(String::from_utf8_lossy(b).trim_end_matches('\0').to_string()),
                16,
            )
        }),
        SerialNumber => take(buf, 10).map(|b| {
            (
                Value::SerialNumber(String::from_utf8_lossy(&b[..9]).to_string()),
                10,
            )
        }),
        String | StringLong | EfaString => decode_cstring(buf, value_len.min(MAX_VALUE_LENGTH)),
        VariableSpace | Special | Waveform | NoneType => Err(ProtocolError::UnimplementedDataType),
    }
}

/// Encode `value` onto the end of `out`, in the wire layout `decode` expects
/// back for `vtype`. Returns the number of bytes appended.
pub fn encode(vtype: ValueType, value: &Value, out: &mut Vec<u8>) -> Result<usize, ProtocolError> {
    use ValueType::*;
    let before = out.len();
    match (vtype, value) {
        (Byte, Value::U8(v)) => out.push(*v),
        (Boolean, Value::Bool(v)) => out.push(if *v { 1 } else { 0 }),
        (Short, Value::I16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (HexShort, Value::U16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (Long, Value::I32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (HexLong | RegisterNumberHexLong, Value::U32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (LongLong, Value::I64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (Float | PowerFactor, Value::F32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (Double, Value::F64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (FloatEnergy, Value::EnergyI32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DoubleEnergy, Value::EnergyI64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (Date, Value::Date(dt)) => out.extend_from_slice(&[dt.day, dt.month, dt.year]),
        (Time, Value::Time(dt)) => out.extend_from_slice(&[dt.hour, dt.minute, dt.second]),
        (DateTime, Value::DateTime(dt)) => {
            out.extend_from_slice(&[dt.day, dt.month, dt.year, dt.hour, dt.minute, dt.second])
        }
        (ErrorString, Value::Str(s)) => {
            let mut buf = [0u8; 16];
            let bytes = s.as_bytes();
            let n = bytes.len().min(16);
            buf[..n].copy_from_slice(&bytes[..n]);
            out.extend_from_slice(&buf);
        }
        (SerialNumber, Value::SerialNumber(s)) => {
            let bytes = s.as_bytes();
            let n = bytes.len().min(9);
            out.extend_from_slice(&bytes[..n]);
            out.extend(std::iter::repeat(0u8).take(9 - n));
            out.push(0u8);
        }
        (String | StringLong | EfaString, Value::Str(s)) => {
            let max_len = MAX_VALUE_LENGTH;
            let bytes = s.as_bytes();
            let n = bytes.len().min(max_len - 1);
            out.extend_from_slice(&bytes[..n]);
            out.push(0u8);
        }
        (VariableSpace | Special | Waveform | NoneType, _) => {
            return Err(ProtocolError::UnimplementedDataType)
        }
        _ => return Err(ProtocolError::UnimplementedDataType),
    }
    Ok(out.len() - before)
}

fn take<'a>(buf: &'a [u8], n: usize) -> Result<&'a [u8], ProtocolError> {
    if buf.len() < n {
        Err(ProtocolError::RequestWrongLength)
    } else {
        Ok(&buf[..n])
    }
}

fn decode_cstring(buf: &[u8], max_len: usize) -> Result<(Value, usize), ProtocolError> {
    let scan_len = max_len.min(buf.len());
    if scan_len == 0 {
        return Err(ProtocolError::RequestWrongLength);
    }
    let window = &buf[..scan_len];
    if let Some(nul) = window.iter().position(|&b| b == 0) {
        let s = String::from_utf8_lossy(&window[..nul]).to_string();
        Ok((Value::Str(s), nul + 1))
    } else if scan_len < max_len {
        Err(ProtocolError::RequestWrongLength)
    } else {
        let s = String::from_utf8_lossy(window).to_string();
        Ok((Value::Str(s), max_len))
    }
}

/// Fixed wire width for a type, where the type has one (strings don't).
pub fn fixed_width(vtype: ValueType) -> Option<usize> {
    use ValueType::*;
    Some(match vtype {
        Byte | Boolean => 1,
        Short | HexShort => 2,
        Long | HexLong | RegisterNumberHexLong => 4,
        LongLong => 8,
        Float | FloatEnergy | PowerFactor => 4,
        Double | DoubleEnergy => 8,
        Date | Time => 3,
        DateTime => 6,
        ErrorString => 16,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_round_trip() {
        let bytes = 230.0f32.to_be_bytes();
        let (v, n) = decode(ValueType::Float, &bytes, 4).unwrap();
        assert_eq!(n, 4);
        assert_eq!(v, Value::F32(230.0));
    }

    #[test]
    fn energy_types_decode_as_raw_integers() {
        let bytes = 12345i32.to_be_bytes();
        let (v, _) = decode(ValueType::FloatEnergy, &bytes, 4).unwrap();
        assert_eq!(v, Value::EnergyI32(12345));

        let bytes64 = 9_876_543_210i64.to_be_bytes();
        let (v, _) = decode(ValueType::DoubleEnergy, &bytes64, 8).unwrap();
        assert_eq!(v, Value::EnergyI64(9_876_543_210));
    }

    #[test]
    fn string_stops_at_nul() {
        let bytes = b"EDMA\0garbage";
        let (v, n) = decode(ValueType::String, bytes, 25).unwrap();
        assert_eq!(v, Value::Str("EDMA".to_string()));
        assert_eq!(n, 5);
    }

    #[test]
    fn string_without_nul_consumes_full_window() {
        let bytes = b"0123456789012345678901234"; // exactly 25 bytes, no NUL
        let (v, n) = decode(ValueType::String, bytes, 25).unwrap();
        assert_eq!(n, 25);
        match v {
            Value::Str(s) => assert_eq!(s.len(), 25),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn serial_number_reads_ten_keeps_nine() {
        let bytes = b"123456789X";
        let (v, n) = decode(ValueType::SerialNumber, bytes, 10).unwrap();
        assert_eq!(n, 10);
        assert_eq!(v, Value::SerialNumber("123456789".to_string()));
    }

    #[test]
    fn encode_decode_round_trip() {
        let cases = [
            (Byte, Value::U8(200)),
            (Boolean, Value::Bool(true)),
            (Short, Value::I16(-1234)),
            (HexShort, Value::U16(0xBEEF)),
            (Long, Value::I32(-123_456)),
            (HexLong, Value::U32(0xDEAD_BEEF)),
            (LongLong, Value::I64(-9_876_543_210)),
            (Float, Value::F32(230.0)),
            (PowerFactor, Value::F32(0.97)),
            (Double, Value::F64(12345.6789)),
            (FloatEnergy, Value::EnergyI32(12345)),
            (DoubleEnergy, Value::EnergyI64(9_876_543_210)),
            (
                Date,
                Value::Date(EdmiDateTime {
                    day: 18,
                    month: 1,
                    year: 26,
                    ..Default::default()
                }),
            ),
            (
                Time,
                Value::Time(EdmiDateTime {
                    hour: 23,
                    minute: 59,
                    second: 1,
                    ..Default::default()
                }),
            ),
            (
                DateTime,
                Value::DateTime(EdmiDateTime {
                    day: 18,
                    month: 1,
                    year: 26,
                    hour: 23,
                    minute: 59,
                    second: 1,
                }),
            ),
            (ErrorString, Value::Str("BAD_CRC".to_string())),
            (String, Value::Str("EDMA".to_string())),
            (SerialNumber, Value::SerialNumber("123456789".to_string())),
        ];

        for (vtype, value) in cases {
            let mut out = Vec::new();
            let written = encode(vtype, &value, &mut out).unwrap();
            assert_eq!(written, out.len());
            let (decoded, consumed) = decode(vtype, &out, out.len()).unwrap();
            assert_eq!(consumed, written);
            assert_eq!(decoded, value, "round trip mismatch for {vtype:?}");
        }
    }

    #[test]
    fn unknown_type_is_unimplemented() {
        assert!(ValueType::try_from(b'Z').is_ok());
        assert_eq!(
            ValueType::try_from(b'9').unwrap_err(),
            ProtocolError::UnimplementedDataType
        );
    }
}
