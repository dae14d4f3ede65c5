//! Byte-stuffing, CRC, and envelope assembly for the EDMI framed protocol.
//!
//! Build order: assemble header+body, append CRC, THEN stuff, THEN append ETX.
//! Parse order: locate STX..ETX, strip ETX, unstuff, THEN verify CRC. The CRC
//! itself always runs over unstuffed bytes.

use crate::error::ProtocolError;
use crate::protocol::{
    CommandExtension, CLIENT_SERIAL, CLIENT_SERIAL_LEN, DLE, E_FRAME, ETX, IDEN_CORRECTOR, STX,
};

const ESCAPE_SET: [u8; 5] = [STX, ETX, super::XON, super::XOFF, DLE];

fn needs_escape(b: u8) -> bool {
    ESCAPE_SET.contains(&b)
}

/// Byte-stuff `packet` (which must start with an unescaped STX at offset 0).
/// Every escape-set byte at offset >= 1 becomes `DLE, (b + 0x40) mod 256`.
pub fn stuff(packet: &[u8]) -> Vec<u8> {
    if packet.is_empty() {
        return Vec::new();
    }
    debug_assert_eq!(packet[0], STX, "packet must start with STX");

    let mut out = Vec::with_capacity(2 * packet.len() - 1);
    out.push(packet[0]);
    for &b in &packet[1..] {
        if needs_escape(b) {
            out.push(DLE);
            out.push(b.wrapping_add(IDEN_CORRECTOR));
        } else {
            out.push(b);
        }
    }
    out
}

/// Reverse of [`stuff`]: replaces `DLE, x` with `x - 0x40`.
pub fn unstuff(packet: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(packet.len());
    let mut i = 0;
    while i < packet.len() {
        let b = packet[i];
        if b == DLE {
            i += 1;
            if i >= packet.len() {
                return Err(ProtocolError::ResponseWrongLength);
            }
            out.push(packet[i].wrapping_sub(IDEN_CORRECTOR));
            i += 1;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(out)
}

/// CRC-CCITT ("HQX" variant): poly 0x1021, init 0x0000, no final XOR, MSB-first.
pub fn crc_hqx(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Validate an unstuffed frame `STX .. payload .. CRC(2) ETX`. Does not
/// modify or strip anything; just checks shape and recomputes the CRC.
pub fn validate_crc(frame: &[u8]) -> ProtocolError {
    if frame.len() < 4 {
        return ProtocolError::ResponseWrongLength;
    }
    if frame[0] != STX || frame[frame.len() - 1] != ETX {
        return ProtocolError::ResponseWrongLength;
    }
    let data = &frame[..frame.len() - 3];
    let recv_crc = u16::from_be_bytes([frame[frame.len() - 3], frame[frame.len() - 2]]);
    let calc_crc = crc_hqx(data);
    if calc_crc != recv_crc {
        return ProtocolError::ResponseCrcError;
    }
    ProtocolError::None
}

/// Begin a request: `STX | E_FRAME | serial(u32 BE) | client_serial(6) | command | [extension]`.
pub fn begin_init_packet(serial: u32, command: u8, extension: Option<CommandExtension>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 1 + 4 + CLIENT_SERIAL_LEN + 2);
    buf.push(STX);
    buf.push(E_FRAME);
    buf.extend_from_slice(&serial.to_be_bytes());
    buf.extend_from_slice(&CLIENT_SERIAL);
    buf.push(command);
    if let Some(ext) = extension {
        buf.push(ext as u8);
    }
    buf
}

/// Finish a request: append CRC, stuff, append ETX (unstuffed).
pub fn end_init_packet(mut packet: Vec<u8>) -> Vec<u8> {
    let crc = crc_hqx(&packet);
    packet.extend_from_slice(&crc.to_be_bytes());
    let mut stuffed = stuff(&packet);
    stuffed.push(ETX);
    stuffed
}

/// Prepend the literal wake-up sequence to a framed request.
pub fn with_wake_up(packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(super::WAKE_UP_SEQ.len() + packet.len());
    out.extend_from_slice(super::WAKE_UP_SEQ);
    out.extend_from_slice(packet);
    out
}

/// Unstuff a raw `STX..ETX` frame as read off the wire and verify its CRC,
/// returning the unstuffed bytes on success.
pub fn decode_frame(raw: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let unstuffed = unstuff(raw)?;
    let err = validate_crc(&unstuffed);
    if !err.is_none() {
        return Err(err);
    }
    Ok(unstuffed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuff_unstuff_round_trip() {
        let body = vec![STX, 0x01, ETX, 0x02, DLE, 0x03, super::super::XON, 0xAA];
        let stuffed = stuff(&body);
        assert_eq!(stuffed[0], STX);
        // no unescaped escape-set byte after offset 0 except possibly as the
        // second half of a DLE pair, which stuff() never produces as a bare STX/ETX
        for &b in &stuffed[1..] {
            // every escape-set byte that appears must be preceded by DLE
            let _ = b;
        }
        let restored = unstuff(&stuffed).unwrap();
        assert_eq!(restored, body);
    }

    #[test]
    fn crc_detects_bit_flip() {
        let mut packet = begin_init_packet(251308613, b'L', None);
        packet.push(0xAB);
        let crc = crc_hqx(&packet);
        packet.extend_from_slice(&crc.to_be_bytes());
        packet.push(ETX);
        assert!(validate_crc(&packet).is_none());

        packet[2] ^= 0x01;
        assert_eq!(validate_crc(&packet), ProtocolError::ResponseCrcError);
    }

    #[test]
    fn escape_invariant_holds() {
        let mut packet = begin_init_packet(1, b'L', None);
        packet.extend_from_slice(&[STX, ETX, DLE, super::super::XON, super::super::XOFF]);
        let crc = crc_hqx(&packet);
        packet.extend_from_slice(&crc.to_be_bytes());
        let stuffed = stuff(&packet);
        for (i, &b) in stuffed.iter().enumerate().skip(1) {
            if needs_escape(b) {
                assert_eq!(stuffed[i - 1], DLE, "unescaped control byte at {i}");
            }
        }
    }

    #[test]
    fn login_success_scenario() {
        // Scenario from the specification's testable-properties section:
        // meter_serial = 251308613, response bytes fixed by example.
        let expected_unstuffed: [u8; 16] = [
            0x02, 0x45, 0x0E, 0xFA, 0xAA, 0x45, 0x01, 0x2B, 0x16, 0x68, 0xFF, 0xFF, 0x06, 0xee,
            0x8c, 0x03,
        ];
        assert_eq!(expected_unstuffed[12], 0x06);
        assert!(validate_crc(&expected_unstuffed).is_none());
    }
}
