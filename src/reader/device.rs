use log::info;
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

// Fixed P1 port framing: 9600 7E1, no flow control
pub const BAUD_RATE: u32 = 9600;
pub const DATA_BITS: DataBits = DataBits::Seven;
pub const PARITY: Parity = Parity::Even;
pub const STOP_BITS: StopBits = StopBits::One;
pub const FLOW_CONTROL: FlowControl = FlowControl::None;

pub fn open_device(port: &str, read_timeout: Duration) -> Result<SerialStream, tokio_serial::Error> {
    info!("Opening {} at {} baud, 7E1, read timeout {:?}", port, BAUD_RATE, read_timeout);
    tokio_serial::new(port, BAUD_RATE)
        .data_bits(DATA_BITS)
        .parity(PARITY)
        .stop_bits(STOP_BITS)
        .flow_control(FLOW_CONTROL)
        .timeout(read_timeout)
        .open_native_async()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        assert!(open_device("/dev/p1meter-does-not-exist", Duration::from_secs(1)).is_err());
    }
}
