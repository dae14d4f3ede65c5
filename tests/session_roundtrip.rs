//! End-to-end engine tests driven over the in-memory `PipeTransport`.

use edmi_meter_driver::protocol::frame::{begin_init_packet, end_init_packet};
use edmi_meter_driver::protocol::session::Engine;
use edmi_meter_driver::protocol::{Command, ResponseCode, MULTI_ERR_IDEN};
use edmi_meter_driver::registers::{PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE};
use edmi_meter_driver::transport::PipeTransport;

const METER_SERIAL: u32 = 251_308_613;

fn framed_response(command: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = begin_init_packet(METER_SERIAL, command, None);
    packet.extend_from_slice(body);
    end_init_packet(packet)
}

#[test]
fn login_success_then_read_three_registers() {
    let mut transport = PipeTransport::new();
    transport.push_response(framed_response(Command::Login as u8, &[ResponseCode::Ack as u8]));

    let mut regs_body = Vec::new();
    regs_body.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
    for v in [230.0f32, 231.5, 229.25] {
        regs_body.push(0x00);
        regs_body.extend_from_slice(&v.to_be_bytes());
    }
    transport.push_response(framed_response(Command::ReadRegisterExtended as u8, &regs_body));

    let engine = Engine::new(transport);
    engine.login(METER_SERIAL, "EDMA", "IMDEIMDE").expect("login should succeed");

    let descriptors = [PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE];
    let regs = engine
        .read_registers(METER_SERIAL, "EDMA", "IMDEIMDE", &descriptors, false)
        .expect("read should succeed");

    assert_eq!(regs.len(), 3);
    for r in &regs {
        assert!(r.error.is_none());
    }
}

#[test]
fn login_failure_surfaces_as_driver_error() {
    let mut transport = PipeTransport::new();
    transport.push_response(framed_response(Command::Login as u8, &[ResponseCode::Can as u8]));

    let engine = Engine::new(transport);
    let err = engine.login(METER_SERIAL, "EDMA", "wrong").unwrap_err();
    assert!(err.to_string().contains("login failed"));
}

#[test]
fn register_not_found_mid_batch_is_reported_without_aborting() {
    let mut transport = PipeTransport::new();

    let mut regs_body = Vec::new();
    regs_body.extend_from_slice(&MULTI_ERR_IDEN.to_be_bytes());
    regs_body.push(0x00);
    regs_body.extend_from_slice(&230.0f32.to_be_bytes());
    regs_body.push(0x03); // REGISTER_NOT_FOUND, no value bytes follow
    regs_body.push(0x00);
    regs_body.extend_from_slice(&229.25f32.to_be_bytes());

    transport.push_response(framed_response(Command::ReadRegisterExtended as u8, &regs_body));

    let engine = Engine::new(transport);
    let descriptors = [PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE];
    let regs = engine
        .read_registers(METER_SERIAL, "EDMA", "IMDEIMDE", &descriptors, false)
        .expect("parse should succeed even with one register missing");

    assert!(regs[0].error.is_none());
    assert_eq!(regs[1].value, None);
    assert!(regs[2].error.is_none());
}
