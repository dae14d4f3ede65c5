//! End-to-end profile download over the in-memory `PipeTransport`: info
//! registers, FILE_INFO, one channel descriptor, a two-record FILE_SEARCH
//! bracket, and a single FILE_READ chunk.

use edmi_meter_driver::profile::ProfileEngine;
use edmi_meter_driver::protocol::frame::{begin_init_packet, end_init_packet};
use edmi_meter_driver::protocol::session::Engine;
use edmi_meter_driver::protocol::value::EdmiDateTime;
use edmi_meter_driver::protocol::{Command, CommandExtension, MULTI_ERR_IDEN};
use edmi_meter_driver::registers::Survey;
use edmi_meter_driver::transport::PipeTransport;

const METER_SERIAL: u32 = 251_308_613;

fn framed(command: u8, extension: Option<CommandExtension>, body: &[u8]) -> Vec<u8> {
    let mut packet = begin_init_packet(METER_SERIAL, command, extension);
    packet.extend_from_slice(body);
    end_init_packet(packet)
}

fn cstring(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

#[test]
fn single_chunk_profile_download() {
    let mut transport = PipeTransport::new();

    // 1. Info registers: interval=1800 (Long), channels_count byte=0 (-> 1 channel).
    let mut info_body = Vec::new();
    info_body.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
    info_body.push(0x00);
    info_body.extend_from_slice(&1800i32.to_be_bytes());
    info_body.push(0x00);
    info_body.push(0u8);
    transport.push_response(framed(Command::ReadRegisterExtended as u8, None, &info_body));

    // 2. FILE_INFO: start_record=100, records_count=500, record_size=4, name="LS01".
    let mut file_info_body = Vec::new();
    file_info_body.extend_from_slice(&0u32.to_be_bytes());
    file_info_body.extend_from_slice(&100i32.to_be_bytes());
    file_info_body.extend_from_slice(&500i32.to_be_bytes());
    file_info_body.extend_from_slice(&4i16.to_be_bytes());
    file_info_body.push(0u8);
    file_info_body.extend_from_slice(&cstring("LS01"));
    transport.push_response(framed(
        Command::FileAccess as u8,
        Some(CommandExtension::FileInfo),
        &file_info_body,
    ));

    // 3. Channel 0 descriptors: Type='F', UnitCode=0, ScalingCode=0, ScalingFactor=1.0, Name="kW".
    let mut channel_body = Vec::new();
    channel_body.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
    channel_body.push(0x00);
    channel_body.push(b'F');
    channel_body.push(0x00);
    channel_body.push(0u8);
    channel_body.push(0x00);
    channel_body.push(0u8);
    channel_body.push(0x00);
    channel_body.extend_from_slice(&1.0f32.to_be_bytes());
    channel_body.push(0x00);
    channel_body.extend_from_slice(&cstring("kW"));
    transport.push_response(framed(Command::ReadRegisterExtended as u8, None, &channel_body));

    // 4. FILE_SEARCH (from): resolves to start_record=100.
    let mut search_from_body = Vec::new();
    search_from_body.extend_from_slice(&0u32.to_be_bytes());
    search_from_body.extend_from_slice(&100i32.to_be_bytes());
    search_from_body.extend_from_slice(&[18, 1, 26, 0, 30, 0]);
    search_from_body.push(0);
    transport.push_response(framed(
        Command::FileAccess as u8,
        Some(CommandExtension::FileSearch),
        &search_from_body,
    ));

    // 5. FILE_SEARCH (to): resolves to start_record=101.
    let mut search_to_body = Vec::new();
    search_to_body.extend_from_slice(&0u32.to_be_bytes());
    search_to_body.extend_from_slice(&101i32.to_be_bytes());
    search_to_body.extend_from_slice(&[18, 1, 26, 1, 0, 0]);
    search_to_body.push(0);
    transport.push_response(framed(
        Command::FileAccess as u8,
        Some(CommandExtension::FileSearch),
        &search_to_body,
    ));

    // 6. FILE_READ: two records, one float channel each.
    let mut read_body = Vec::new();
    read_body.extend_from_slice(&0u32.to_be_bytes());
    read_body.extend_from_slice(&100i32.to_be_bytes());
    read_body.extend_from_slice(&2i16.to_be_bytes());
    read_body.extend_from_slice(&0i16.to_be_bytes());
    read_body.extend_from_slice(&4i16.to_be_bytes());
    read_body.extend_from_slice(&12.5f32.to_be_bytes());
    read_body.extend_from_slice(&13.0f32.to_be_bytes());
    transport.push_response(framed(
        Command::FileAccess as u8,
        Some(CommandExtension::FileRead),
        &read_body,
    ));

    let engine = Engine::new(transport);
    let profile_engine = ProfileEngine::new(&engine);

    let from_dt = EdmiDateTime {
        year: 26,
        month: 1,
        day: 18,
        hour: 0,
        minute: 30,
        second: 0,
    };
    let to_dt = EdmiDateTime {
        year: 26,
        month: 1,
        day: 19,
        hour: 0,
        minute: 0,
        second: 0,
    };

    let (spec, fields, err) = profile_engine.read_profile(
        METER_SERIAL,
        "EDMA",
        "IMDEIMDE",
        Survey::Ls01 as u16,
        from_dt,
        to_dt,
        None,
        false,
        None,
    );

    assert!(err.is_none(), "unexpected profile error: {err:?}");
    assert_eq!(spec.channels_count, 1);
    assert_eq!(spec.start_record, 100);
    assert_eq!(spec.records_count, 2);
    assert_eq!(spec.name, "LS01");
    assert_eq!(spec.channels_info.len(), 1);
    assert_eq!(spec.channels_info[0].name, "kW");
    assert_eq!(fields.len(), 2);
}
