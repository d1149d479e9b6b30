use core::time::Duration;

/// The two line speeds used to shape 1-Wire waveforms on a UART.
///
/// At [`BaudRate::Reset`] one UART frame (start bit, 8 data bits, stop bit)
/// lasts long enough to produce a reset pulse and sample the presence pulse.
/// At [`BaudRate::Signal`] one frame fits inside a single 1-Wire time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaudRate {
    /// 9600 baud, used for reset/presence cycles.
    Reset,
    /// 115200 baud, used for read and write time slots.
    Signal,
}

impl BaudRate {
    /// Symbol rate in bits per second.
    pub const fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::Reset => 9600,
            BaudRate::Signal => 115_200,
        }
    }
}

/// A byte-oriented serial channel whose TX and RX are both tied to the 1-Wire line.
///
/// Everything written is echoed back through the line, overlaid with whatever
/// the devices on the bus pulled low.
pub trait Transport {
    /// The error type returned by the operations of this trait.
    type Error;

    /// Writes all `bytes` to the channel.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// # Returns
    /// The number of bytes placed in `buf`. `Ok(0)` means the timeout
    /// elapsed with nothing received.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;

    /// Changes the line speed. The new rate applies to the next [`Transport::write`].
    fn set_baud_rate(&mut self, rate: BaudRate) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        (**self).read(buf, timeout)
    }

    fn set_baud_rate(&mut self, rate: BaudRate) -> Result<(), Self::Error> {
        (**self).set_baud_rate(rate)
    }
}
