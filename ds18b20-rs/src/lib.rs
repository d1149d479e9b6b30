#![no_std]
#![deny(missing_docs)]
//! Driver for the DS18B20 digital thermometer on any [`OneWire`] bus.
//!
//! Every operation addresses a single sensor by its ROM code. Temperature
//! conversions are polled through read slots, so the driver also works when
//! the conversion time of the selected resolution is not known up front.
extern crate alloc;

use alloc::vec::Vec;
use bitfield_struct::bitfield;
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use fixed::types::I12F4;
use uart_onewire::{Command, OneWire, OneWireCrc, OneWireError, OneWireResult};

/// Temperature in degrees Celsius, in the 1/16 degree steps of the sensor.
pub type Temperature = I12F4;

/// Decodes the two temperature bytes of the scratchpad (least significant
/// byte first) as a signed count of 1/16 degrees.
pub const fn decode_temperature(raw: [u8; 2]) -> Temperature {
    I12F4::from_le_bytes(raw)
}

#[repr(u8)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
/// Conversion resolution, bits 5 and 6 of the configuration register.
pub enum Resolution {
    /// 0.5 degC steps
    Bits9 = 0,
    /// 0.25 degC steps
    Bits10 = 1,
    /// 0.125 degC steps
    Bits11 = 2,
    /// 0.0625 degC steps, the power-on default
    #[default]
    Bits12 = 3,
}

impl Resolution {
    /// Maximum conversion time in microseconds.
    pub const fn conversion_time_us(&self) -> u32 {
        use Resolution::*;
        match self {
            Bits9 => 93750,
            Bits10 => 187500,
            Bits11 => 375000,
            Bits12 => 750000,
        }
    }

    /// Maximum conversion time.
    pub const fn conversion_time(&self) -> Duration {
        Duration::from_micros(self.conversion_time_us() as u64)
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Bits9,
            1 => Self::Bits10,
            2 => Self::Bits11,
            _ => Self::Bits12,
        }
    }

    const fn into_bits(self) -> u8 {
        self as u8
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
/// The configuration register, byte 4 of the scratchpad.
pub struct ConfigRegister {
    /// Reads back as ones.
    #[bits(5, default = 0x1f)]
    __: u8,
    /// Conversion resolution.
    #[bits(2, default = Resolution::Bits12)]
    pub resolution: Resolution,
    #[bits(1)]
    __: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Alarm thresholds and resolution written with [`Ds18b20::write_config`].
///
/// A device is in alarm state when the last converted temperature is above
/// `high` or below `low`; it then answers alarm searches.
pub struct Config {
    /// Upper alarm threshold, degC.
    pub high: i8,
    /// Lower alarm threshold, degC.
    pub low: i8,
    /// Conversion resolution.
    pub resolution: Resolution,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            high: 75,
            low: 70,
            resolution: Resolution::Bits12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Decoded contents of the scratchpad memory.
pub struct Scratchpad {
    /// Last converted temperature.
    pub temperature: Temperature,
    /// Upper alarm threshold, degC.
    pub high: i8,
    /// Lower alarm threshold, degC.
    pub low: i8,
    /// Configuration register.
    pub config: ConfigRegister,
}

impl Scratchpad {
    /// Decodes the nine scratchpad bytes.
    ///
    /// # Returns
    /// [`None`] if the last byte is not the CRC of the eight before it.
    pub fn from_bytes(bytes: &[u8; 9]) -> Option<Self> {
        if !OneWireCrc::validate(bytes) {
            return None;
        }
        Some(Self {
            temperature: decode_temperature([bytes[0], bytes[1]]),
            high: bytes[2] as i8,
            low: bytes[3] as i8,
            config: ConfigRegister::from_bits(bytes[4]),
        })
    }

    /// Thresholds and resolution held in the scratchpad.
    pub fn config(&self) -> Config {
        Config {
            high: self.high,
            low: self.low,
            resolution: self.config.resolution(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A DS18B20 on the bus, identified by its ROM code.
pub struct Ds18b20 {
    rom: u64,
    conversion_timeout: Duration,
    poll_interval: Duration,
}

impl Ds18b20 {
    /// Family code of the DS18B20.
    pub const FAMILY: u8 = 0x28;

    /// A sensor with the given ROM code, a 1 s conversion timeout and a 10 ms
    /// poll interval.
    pub const fn new(rom: u64) -> Self {
        Self {
            rom,
            conversion_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Sets how long [`Ds18b20::wait_for_conversion`] waits for a conversion.
    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    /// Sets the delay between two polls of a running conversion.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// ROM code of the sensor.
    pub fn rom(&self) -> u64 {
        self.rom
    }

    /// Finds every DS18B20 on the bus.
    pub fn discover<O: OneWire>(bus: &mut O) -> OneWireResult<Vec<Self>, O::BusError> {
        let roms = bus.search(false)?;
        Ok(roms
            .into_iter()
            .filter(|&rom| rom as u8 == Self::FAMILY)
            .map(Self::new)
            .collect())
    }

    /// Starts a temperature conversion.
    pub fn start_conversion<O: OneWire>(&self, bus: &mut O) -> OneWireResult<(), O::BusError> {
        bus.address(Some(self.rom))?;
        bus.write_command(Command::ConvertTemp)?;
        log::debug!("Conversion started on {:016x}", self.rom);
        Ok(())
    }

    /// Polls a conversion started with [`Ds18b20::start_conversion`] until the
    /// sensor reports completion.
    ///
    /// `cancel` is evaluated before every poll; returning `true` abandons the
    /// wait.
    ///
    /// # Errors
    /// [`OneWireError::Timeout`] if the conversion is still running after the
    /// configured timeout, [`OneWireError::Cancelled`] if `cancel` fired.
    pub fn wait_for_conversion<O, D, F>(
        &self,
        bus: &mut O,
        delay: &mut D,
        mut cancel: F,
    ) -> OneWireResult<(), O::BusError>
    where
        O: OneWire,
        D: DelayNs,
        F: FnMut() -> bool,
    {
        let polls = self
            .conversion_timeout
            .as_nanos()
            .checked_div(self.poll_interval.as_nanos())
            .unwrap_or(1);
        let interval_us = u32::try_from(self.poll_interval.as_micros()).unwrap_or(u32::MAX);
        let mut poll = 0;
        loop {
            if cancel() {
                log::info!("Conversion on {:016x} cancelled", self.rom);
                return Err(OneWireError::Cancelled);
            }
            // The sensor holds the line low until the conversion is done
            if bus.read_bit()? {
                return Ok(());
            }
            if poll >= polls {
                log::warn!(
                    "Conversion on {:016x} did not finish within {:?}",
                    self.rom,
                    self.conversion_timeout
                );
                return Err(OneWireError::Timeout);
            }
            poll += 1;
            delay.delay_us(interval_us);
        }
    }

    /// Converts and reads the temperature.
    ///
    /// # Arguments
    /// * `check_crc` - Read the whole scratchpad and validate its CRC instead
    ///   of stopping after the two temperature bytes.
    pub fn read_temperature<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        check_crc: bool,
    ) -> OneWireResult<Temperature, O::BusError> {
        self.read_temperature_with(bus, delay, check_crc, || false)
    }

    /// [`Ds18b20::read_temperature`] with a cancellation hook for the
    /// conversion wait.
    pub fn read_temperature_with<O, D, F>(
        &self,
        bus: &mut O,
        delay: &mut D,
        check_crc: bool,
        cancel: F,
    ) -> OneWireResult<Temperature, O::BusError>
    where
        O: OneWire,
        D: DelayNs,
        F: FnMut() -> bool,
    {
        self.start_conversion(bus)?;
        self.wait_for_conversion(bus, delay, cancel)?;
        bus.address(Some(self.rom))?;
        bus.write_command(Command::ReadScratchpad)?;
        let mut buf = [0; 9];
        if !check_crc {
            bus.read_bytes(&mut buf[..2])?;
            return Ok(decode_temperature([buf[0], buf[1]]));
        }
        bus.read_bytes(&mut buf)?;
        if !OneWireCrc::validate(&buf) {
            log::warn!("Bad scratchpad CRC from {:016x}: {buf:02x?}", self.rom);
            return Err(OneWireError::ChecksumMismatch);
        }
        Ok(decode_temperature([buf[0], buf[1]]))
    }

    /// Reads and validates the full scratchpad.
    pub fn read_scratchpad<O: OneWire>(
        &self,
        bus: &mut O,
    ) -> OneWireResult<Scratchpad, O::BusError> {
        bus.address(Some(self.rom))?;
        bus.write_command(Command::ReadScratchpad)?;
        let mut buf = [0; 9];
        bus.read_bytes(&mut buf)?;
        Scratchpad::from_bytes(&buf).ok_or(OneWireError::ChecksumMismatch)
    }

    /// Writes the alarm thresholds and resolution to the scratchpad. Use
    /// [`Ds18b20::copy_scratchpad`] to keep them across power cycles.
    pub fn write_config<O: OneWire>(
        &self,
        bus: &mut O,
        config: &Config,
    ) -> OneWireResult<(), O::BusError> {
        bus.address(Some(self.rom))?;
        bus.write_command(Command::WriteScratchpad)?;
        bus.write_byte(config.high as u8)?;
        bus.write_byte(config.low as u8)?;
        bus.write_byte(ConfigRegister::new().with_resolution(config.resolution).into_bits())
    }

    /// Saves thresholds and configuration from the scratchpad to EEPROM.
    pub fn copy_scratchpad<O: OneWire>(&self, bus: &mut O) -> OneWireResult<(), O::BusError> {
        bus.address(Some(self.rom))?;
        bus.write_command(Command::CopyScratchpad)
    }

    /// Reloads thresholds and configuration from EEPROM into the scratchpad.
    pub fn recall_eeprom<O: OneWire>(&self, bus: &mut O) -> OneWireResult<(), O::BusError> {
        bus.address(Some(self.rom))?;
        bus.write_command(Command::RecallEeprom)
    }

    /// Whether the sensor draws its power from the data line.
    pub fn is_parasite_powered<O: OneWire>(&self, bus: &mut O) -> OneWireResult<bool, O::BusError> {
        bus.address(Some(self.rom))?;
        bus.write_command(Command::ReadPowerSupply)?;
        // Parasite powered parts pull the slot low
        Ok(!bus.read_bit()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_power_on_value() {
        assert_eq!(decode_temperature([0x50, 0x05]), Temperature::from_num(85));
    }

    #[test]
    fn decodes_negative_values() {
        assert_eq!(decode_temperature([0x5e, 0xff]), Temperature::from_num(-10.125));
        assert_eq!(decode_temperature([0x90, 0xfc]), Temperature::from_num(-55));
        assert_eq!(decode_temperature([0xf8, 0xff]), Temperature::from_num(-0.5));
    }

    #[test]
    fn config_register_layout() {
        assert_eq!(ConfigRegister::new().into_bits(), 0x7f);
        let cfg = ConfigRegister::new().with_resolution(Resolution::Bits9);
        assert_eq!(cfg.into_bits(), 0x1f);
        assert_eq!(ConfigRegister::from_bits(0x5f).resolution(), Resolution::Bits11);
        assert_eq!(ConfigRegister::from_bits(0x3f).resolution(), Resolution::Bits10);
    }

    #[test]
    fn conversion_time_halves_per_bit() {
        assert_eq!(Resolution::Bits12.conversion_time(), Duration::from_millis(750));
        assert_eq!(
            Resolution::Bits9.conversion_time_us() * 8,
            Resolution::Bits12.conversion_time_us()
        );
    }

    #[test]
    fn scratchpad_decoding() {
        let mut bytes = [0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0x00];
        bytes[8] = OneWireCrc::compute(&bytes[..8]);
        let pad = Scratchpad::from_bytes(&bytes).unwrap();
        assert_eq!(pad.temperature, Temperature::from_num(85));
        assert_eq!(pad.config(), Config::default());
        bytes[2] = 0x4c;
        assert!(Scratchpad::from_bytes(&bytes).is_none());
    }

    #[test]
    fn family_matches_rom_low_byte() {
        assert_eq!(0x2b0000047ff88528u64 as u8, Ds18b20::FAMILY);
    }
}
