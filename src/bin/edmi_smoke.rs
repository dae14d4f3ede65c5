//! Quick smoke-test binary for an EDMI meter.
//! Run with: cargo run --bin edmi-smoke -- <port> <baud> <meter_serial> <username> <password>
//! Example:
//!   cargo run --bin edmi-smoke -- /dev/ttyUSB0 9600 251308613 EDMA IMDEIMDE

use edmi_meter_driver::protocol::session::Engine;
use edmi_meter_driver::registers::{
    FREQUENCY, PHASE_A_CURRENT, PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE, TOTAL_IMPORT_KWH,
};
use edmi_meter_driver::transport::{SerialSettings, SerialTransport};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let port_name = args.get(1).map(|s| s.as_str()).unwrap_or("/dev/ttyUSB0");
    let baud: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(9600);
    let meter_serial: u32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
    let username = args.get(4).map(|s| s.as_str()).unwrap_or("EDMA");
    let password = args.get(5).map(|s| s.as_str()).unwrap_or("");

    println!("=== EDMI Meter Smoke Test ===");
    println!("Port: {port_name}  Baud: {baud}  Meter serial: {meter_serial}");
    println!();

    println!("[1] Listing available serial ports...");
    match edmi_meter_driver::serial::list_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                println!("    No ports found!");
            }
            for p in &ports {
                println!("    - {} ({})", p.name, p.port_type);
            }
        }
        Err(e) => println!("    Error listing ports: {e}"),
    }
    println!();

    println!("[2] Opening port {port_name} @ {baud} baud (8N1)...");
    let settings = SerialSettings {
        port_name: port_name.to_string(),
        baud_rate: baud,
        ..SerialSettings::default()
    };
    let transport = match SerialTransport::open(&settings) {
        Ok(t) => {
            println!("    Port opened.");
            t
        }
        Err(e) => {
            eprintln!("    FAILED to open port: {e}");
            std::process::exit(1);
        }
    };

    let engine = Engine::new(transport);

    println!("[3] Logging in as {username}...");
    match engine.login(meter_serial, username, password) {
        Ok(()) => println!("    Login OK."),
        Err(e) => {
            eprintln!("    Login failed: {e}");
            std::process::exit(1);
        }
    }
    println!();

    println!("[4] Reading instantaneous registers...");
    let descriptors = [
        PHASE_A_VOLTAGE,
        PHASE_B_VOLTAGE,
        PHASE_C_VOLTAGE,
        PHASE_A_CURRENT,
        FREQUENCY,
        TOTAL_IMPORT_KWH,
    ];
    match engine.read_registers(meter_serial, username, password, &descriptors, false) {
        Ok(regs) => {
            for reg in &regs {
                if reg.error.is_none() {
                    println!("    {}: {:?}", reg.descriptor.name, reg.value);
                } else {
                    println!("    {}: error {}", reg.descriptor.name, reg.error);
                }
            }
        }
        Err(e) => eprintln!("    Read failed: {e}"),
    }
    println!();

    println!("=== Done ===");
}
