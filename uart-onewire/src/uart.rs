use crate::{BaudRate, OneWire, OneWireError, OneWireResult, Transport};
use core::time::Duration;

/// Byte sent at [`BaudRate::Reset`]: five low bits (start bit included) form
/// the reset pulse, the four high bits leave room for the presence pulse.
pub(crate) const RESET_PULSE: u8 = 0xf0;
/// A full low frame: write-zero slot.
pub(crate) const SLOT_LOW: u8 = 0x00;
/// Only the start bit is low: write-one or read slot.
pub(crate) const SLOT_HIGH: u8 = 0xff;

/// Upper bound on reads spent discarding stale input while building a bus.
const MAX_DRAIN_READS: usize = 64;

/// A 1-Wire bus master driving the line through a UART.
///
/// TX drives the bus through an open-drain stage and RX samples the bus, so
/// every byte written is echoed back as the line actually looked. Takes
/// ownership of a [`Transport`] and keeps track of the configured
/// [`BaudRate`], switching it only when an operation needs the other one.
#[derive(Debug)]
pub struct UartOneWire<T> {
    pub(crate) transport: T,
    pub(crate) baud: Option<BaudRate>,
    pub(crate) timeout: Duration,
}

/// Builder for creating a [`UartOneWire`] instance with custom configuration.
#[derive(Debug, Clone)]
pub struct UartOneWireBuilder {
    pub(crate) timeout: Duration,
    pub(crate) drain: bool,
}

impl Default for UartOneWireBuilder {
    fn default() -> Self {
        UartOneWireBuilder {
            timeout: Duration::from_millis(50),
            drain: true,
        }
    }
}

impl UartOneWireBuilder {
    /// Sets how long a single round trip waits for its echo.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether stale input is discarded when the bus is built.
    pub fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }

    /// Builds a new `UartOneWire` instance with the specified configuration.
    pub fn build<T: Transport>(self, transport: T) -> OneWireResult<UartOneWire<T>, T::Error> {
        let mut bus = UartOneWire {
            transport,
            baud: None,
            timeout: self.timeout,
        };
        if self.drain {
            bus.drain()?;
        }
        Ok(bus)
    }
}

impl<T> UartOneWire<T> {
    /// The line speed currently configured on the transport, if any.
    pub fn baud_rate(&self) -> Option<BaudRate> {
        self.baud
    }

    /// The round-trip timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Closes the bus and hands back the transport.
    pub fn release(self) -> T {
        self.transport
    }
}

impl<T: Transport> UartOneWire<T> {
    /// Discard whatever is waiting in the receive buffer.
    ///
    /// # Returns
    /// The number of bytes discarded.
    pub fn drain(&mut self) -> OneWireResult<usize, T::Error> {
        let mut buf = [0; 16];
        let mut total = 0;
        for _ in 0..MAX_DRAIN_READS {
            let n = self.transport.read(&mut buf, self.timeout)?;
            if n == 0 {
                break;
            }
            log::info!("Discarded {n} stale bytes from the serial line");
            total += n;
        }
        Ok(total)
    }

    fn prepare(&mut self, rate: BaudRate) -> OneWireResult<(), T::Error> {
        if self.baud != Some(rate) {
            self.transport.set_baud_rate(rate)?;
            log::debug!("Setting baud rate to {}", rate.bits_per_second());
            self.baud = Some(rate);
        }
        Ok(())
    }

    /// Write a byte on the line and return the echo.
    fn round_trip(&mut self, byte: u8) -> OneWireResult<u8, T::Error> {
        self.transport.write(&[byte])?;
        // We should only receive one byte, but read more in case something
        // strange has happened.
        let mut buf = [0; 4];
        let n = self.transport.read(&mut buf, self.timeout)?;
        log::trace!("Wrote {byte:#04x}, read {:02x?}", &buf[..n]);
        if n == 0 {
            return Err(OneWireError::WiringFault);
        }
        let mut echo = buf[n - 1];
        let mut total = n;
        let mut last = n;
        // A full buffer may hide the real echo behind stale bytes
        for _ in 0..MAX_DRAIN_READS {
            if last < buf.len() {
                break;
            }
            last = self.transport.read(&mut buf, self.timeout)?;
            if last > 0 {
                echo = buf[last - 1];
                total += last;
            }
        }
        if total > 1 {
            log::error!("Read {total} bytes, but should only have read one");
        }
        Ok(echo)
    }
}

impl<T: Transport> OneWire for UartOneWire<T> {
    type BusError = T::Error;

    fn reset(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.prepare(BaudRate::Reset)?;
        // Devices answer by pulling some of the trailing high bits low.
        Ok(self.round_trip(RESET_PULSE)? < RESET_PULSE)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        self.prepare(BaudRate::Signal)?;
        self.round_trip(if bit { SLOT_HIGH } else { SLOT_LOW })?;
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.prepare(BaudRate::Signal)?;
        // A device sending a zero holds the line low past the start bit.
        Ok(self.round_trip(SLOT_HIGH)? == SLOT_HIGH)
    }
}
