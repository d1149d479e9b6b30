use crate::{Command, OneWireCrc, OneWireError, OneWireResult, OneWireSearch, OneWireSearchKind};
use alloc::vec::Vec;
use core::iter::FusedIterator;

/// Trait for 1-Wire communication.
/// This trait defines the basic operations required for 1-Wire communication, such as resetting the bus,
/// writing and reading bits, and the byte and integer operations composed from them.
///
/// Multi-bit fields always travel least significant bit first.
pub trait OneWire {
    /// The error type returned by the operations of this trait.
    /// This type is used to indicate errors in the underlying hardware or communication.
    type BusError;

    /// Resets the 1-Wire bus.
    ///
    /// # Returns
    /// `true` if at least one device answered with a presence pulse.
    ///
    /// # Errors
    /// This method returns an error if the reset operation fails.
    fn reset(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit to the 1-Wire bus.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Reads a single bit from the 1-Wire bus.
    /// # Returns
    /// The bit read from the bus.
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a sequence of bits, first element first.
    fn write_bits<I>(&mut self, bits: I) -> OneWireResult<(), Self::BusError>
    where
        I: IntoIterator<Item = bool>,
        Self: Sized,
    {
        for bit in bits {
            self.write_bit(bit)?;
        }
        Ok(())
    }

    /// Returns an iterator that performs `count` read slots, one per call to
    /// [`Iterator::next`]. The iterator stops early after the first error.
    fn read_bits(&mut self, count: usize) -> ReadBits<'_, Self>
    where
        Self: Sized,
    {
        ReadBits {
            bus: self,
            remaining: count,
        }
    }

    /// Writes a byte to the 1-Wire bus.
    /// # Arguments
    /// * `byte` - The byte to write to the bus.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        for i in 0..8 {
            self.write_bit(byte >> i & 1 == 1)?;
        }
        Ok(())
    }

    /// Writes any integer value as a byte.
    ///
    /// # Errors
    /// [`OneWireError::InvalidByte`] if `value` does not fit in `0..=255`; the
    /// bus is not touched in that case.
    fn try_write_byte<V>(&mut self, value: V) -> OneWireResult<(), Self::BusError>
    where
        V: TryInto<u8>,
        Self: Sized,
    {
        let byte = value.try_into().map_err(|_| OneWireError::InvalidByte)?;
        self.write_byte(byte)
    }

    /// Writes the low `width` bits of `value`.
    ///
    /// # Errors
    /// [`OneWireError::InvalidWidth`] if `width` exceeds 64.
    fn write_int(&mut self, value: u64, width: u32) -> OneWireResult<(), Self::BusError> {
        if width > u64::BITS {
            return Err(OneWireError::InvalidWidth { width });
        }
        let value = value & u64::MAX.checked_shr(u64::BITS - width).unwrap_or(0);
        for i in 0..width {
            self.write_bit(value >> i & 1 == 1)?;
        }
        Ok(())
    }

    /// Reads a byte from the 1-Wire bus.
    /// # Returns
    /// Byte read from the bus.
    ///
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Fills `buf` with consecutive bytes read from the bus.
    fn read_bytes(&mut self, buf: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Writes a ROM or function command.
    fn write_command(&mut self, cmd: Command) -> OneWireResult<(), Self::BusError> {
        self.write_byte(cmd.code())
    }

    /// Addresses devices on the 1-Wire bus.
    /// Any function command should be preceded by this method to select the devices it applies to.
    /// Note: reading after addressing all devices returns the wired-AND of their answers.
    /// # Arguments
    /// * `rom` - The ROM address of the device to address. Pass [`None`] to skip ROM addressing and address all devices on the bus.
    ///
    /// # Errors
    /// [`OneWireError::NoDevicePresent`] if no device answers the reset pulse.
    fn address(&mut self, rom: Option<u64>) -> OneWireResult<(), Self::BusError> {
        if !self.reset()? {
            return Err(OneWireError::NoDevicePresent);
        }
        match rom {
            Some(rom) => {
                self.write_command(Command::MatchRom)?;
                self.write_int(rom, u64::BITS)
            }
            None => self.write_command(Command::SkipRom),
        }
    }

    /// Reads the ROM code of the only device on the bus.
    ///
    /// With more than one device present the answers collide and the result
    /// fails the CRC check.
    fn read_rom(&mut self) -> OneWireResult<u64, Self::BusError> {
        if !self.reset()? {
            return Err(OneWireError::NoDevicePresent);
        }
        self.write_command(Command::ReadRom)?;
        let mut rom = [0; 8];
        self.read_bytes(&mut rom)?;
        if !OneWireCrc::validate(&rom) {
            return Err(OneWireError::ChecksumMismatch);
        }
        Ok(u64::from_le_bytes(rom))
    }

    /// Enumerates every device on the bus, or only the alarmed ones if
    /// `alarm_only` is set. See [`OneWireSearch`].
    fn search(&mut self, alarm_only: bool) -> OneWireResult<Vec<u64>, Self::BusError>
    where
        Self: Sized,
    {
        let kind = if alarm_only {
            OneWireSearchKind::Alarmed
        } else {
            OneWireSearchKind::Normal
        };
        OneWireSearch::new(self, kind).collect_all()
    }
}

/// Iterator over read slots returned by [`OneWire::read_bits`].
pub struct ReadBits<'a, T: ?Sized> {
    bus: &'a mut T,
    remaining: usize,
}

impl<T: OneWire + ?Sized> Iterator for ReadBits<'_, T> {
    type Item = OneWireResult<bool, T::BusError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let res = self.bus.read_bit();
        if res.is_err() {
            self.remaining = 0;
        }
        Some(res)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<T: OneWire + ?Sized> FusedIterator for ReadBits<'_, T> {}
