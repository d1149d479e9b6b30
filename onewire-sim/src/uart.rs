use crate::{SimDevice, SimError};
use std::{collections::VecDeque, time::Duration};
use uart_onewire::{BaudRate, Transport};

const RESET_PULSE: u8 = 0xf0;
/// Reset echo when at least one device answered with a presence pulse.
const PRESENCE_ECHO: u8 = 0xe0;
const SLOT_HIGH: u8 = 0xff;
/// Slot echo when a device held the line low past the start bit.
const SLOT_PULLED: u8 = 0xfe;

/// A UART whose TX and RX are tied to a simulated 1-Wire line.
#[derive(Debug, Default)]
pub struct SimUart {
    baud: Option<BaudRate>,
    devices: Vec<SimDevice>,
    input: VecDeque<u8>,
    disconnected: bool,
    resets: usize,
    slots: usize,
}

impl SimUart {
    /// A correctly wired line with nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// A line where RX never sees what TX sends.
    pub fn disconnected() -> Self {
        Self {
            disconnected: true,
            ..Self::default()
        }
    }

    /// Attaches a device to the line.
    pub fn attach(&mut self, device: SimDevice) {
        log::debug!("Attaching device {:016x} to bus", device.rom());
        self.devices.push(device);
    }

    /// Builder form of [`SimUart::attach`].
    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.attach(device);
        self
    }

    /// Builder form of [`SimUart::attach`] for several devices.
    pub fn with_devices<I: IntoIterator<Item = SimDevice>>(mut self, devices: I) -> Self {
        for device in devices {
            self.attach(device);
        }
        self
    }

    /// The attached devices.
    pub fn devices(&self) -> &[SimDevice] {
        &self.devices
    }

    /// Queues an extra byte on the receive side.
    pub fn push_input(&mut self, byte: u8) {
        self.input.push_back(byte);
    }

    /// The configured speed.
    pub fn baud_rate(&self) -> Option<BaudRate> {
        self.baud
    }

    /// Number of reset pulses seen.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Number of time slots seen.
    pub fn slots(&self) -> usize {
        self.slots
    }

    fn frame(&mut self, byte: u8) -> Result<u8, SimError> {
        match self.baud {
            None => Err(SimError::BaudNotSet),
            Some(BaudRate::Reset) if byte == RESET_PULSE => {
                self.resets += 1;
                let mut presence = false;
                for device in self.devices.iter_mut() {
                    presence |= device.reset();
                }
                Ok(if presence { PRESENCE_ECHO } else { RESET_PULSE })
            }
            Some(BaudRate::Signal) if byte == 0x00 || byte == SLOT_HIGH => {
                self.slots += 1;
                // Wired-AND: every device sees the slot, any of them may pull low
                let mut line = byte == SLOT_HIGH;
                for device in self.devices.iter_mut() {
                    line &= device.frame(byte == SLOT_HIGH)?;
                }
                Ok(match (byte, line) {
                    (0x00, _) => 0x00,
                    (_, true) => SLOT_HIGH,
                    (_, false) => SLOT_PULLED,
                })
            }
            Some(baud) => Err(SimError::UnexpectedFrame { baud, byte }),
        }
    }
}

impl Transport for SimUart {
    type Error = SimError;

    fn write(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        for &byte in bytes {
            let echo = self.frame(byte)?;
            if !self.disconnected {
                self.input.push_back(echo);
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SimError> {
        let n = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn set_baud_rate(&mut self, rate: BaudRate) -> Result<(), SimError> {
        self.baud = Some(rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom_with_crc;

    #[test]
    fn reset_echo_reflects_presence() {
        let mut uart = SimUart::new();
        uart.set_baud_rate(BaudRate::Reset).unwrap();
        uart.write(&[RESET_PULSE]).unwrap();
        uart.attach(SimDevice::new(rom_with_crc(0x28, 1)));
        uart.write(&[RESET_PULSE]).unwrap();
        let mut buf = [0; 4];
        assert_eq!(uart.read(&mut buf, Duration::ZERO).unwrap(), 2);
        assert_eq!(buf[..2], [RESET_PULSE, PRESENCE_ECHO]);
    }

    #[test]
    fn frames_must_match_the_speed() {
        let mut uart = SimUart::new();
        assert_eq!(uart.write(&[0xff]), Err(SimError::BaudNotSet));
        uart.set_baud_rate(BaudRate::Signal).unwrap();
        assert_eq!(
            uart.write(&[RESET_PULSE]),
            Err(SimError::UnexpectedFrame {
                baud: BaudRate::Signal,
                byte: RESET_PULSE
            })
        );
    }

    #[test]
    fn disconnected_line_never_echoes() {
        let mut uart = SimUart::disconnected();
        uart.set_baud_rate(BaudRate::Reset).unwrap();
        uart.write(&[RESET_PULSE]).unwrap();
        assert_eq!(uart.read(&mut [0; 1], Duration::ZERO).unwrap(), 0);
        assert_eq!(uart.resets(), 1);
    }
}
