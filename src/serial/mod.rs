pub mod port_list;

pub use port_list::{list_ports, PortInfo};
