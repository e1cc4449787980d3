use std::time::Duration;
use log::info;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use super::D0Error;

/// Line settings of the optical D0 head
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// How long to wait for a single byte
    pub byte_timeout: Duration,
}

impl SerialSettings {
    /// 9600 7E1 with one second per byte, what the EBZ DD3 pushes with
    pub fn d0(port_name: String) -> Self {
        Self {
            port_name,
            baud_rate: 9600,
            data_bits: DataBits::Seven,
            stop_bits: StopBits::One,
            parity: Parity::Even,
            byte_timeout: Duration::from_secs(1),
        }
    }
}

pub fn open_serial(settings: &SerialSettings) -> Result<SerialStream, D0Error> {
    info!("Opening D0 serial port {} with {} baud", settings.port_name, settings.baud_rate);

    tokio_serial::new(&settings.port_name, settings.baud_rate)
        .data_bits(settings.data_bits)
        .stop_bits(settings.stop_bits)
        .parity(settings.parity)
        .timeout(settings.byte_timeout)
        .open_native_async()
        .map_err(|e| D0Error::SerialOpen(format!("{}: {}", settings.port_name, e)))
}
