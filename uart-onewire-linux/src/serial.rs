use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;
use uart_onewire::{BaudRate, Transport};

/// A serial port with TX and RX tied to the 1-Wire line, 8N1 without flow
/// control.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `path` at the time slot rate.
    pub fn open(path: &str) -> serialport::Result<Self> {
        let port = serialport::new(path, BaudRate::Signal.bits_per_second())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;
        log::debug!("Opened {path}");
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    type Error = io::Error;

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            res => res,
        }
    }

    fn set_baud_rate(&mut self, rate: BaudRate) -> io::Result<()> {
        Ok(self.port.set_baud_rate(rate.bits_per_second())?)
    }
}
