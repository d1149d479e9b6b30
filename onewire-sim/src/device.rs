use crate::SimError;
use rand::Rng;
use uart_onewire::{Command, OneWireCrc};

/// Scratchpad of a DS18B20 straight after power-up, CRC byte excluded.
const POWER_ON_SCRATCHPAD: [u8; 8] = [0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10];

/// Builds a ROM code from a family code and a 48-bit serial number.
pub fn rom_with_crc(family: u8, serial: u64) -> u64 {
    let prefix = u64::from(family) | (serial & 0xffff_ffff_ffff) << 8;
    let crc = OneWireCrc::compute(&prefix.to_le_bytes()[..7]);
    prefix | u64::from(crc) << 56
}

/// Which of the three slots of a search step comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSlot {
    /// The device sends its ROM bit.
    Bit,
    /// The device sends the complement of its ROM bit.
    Complement,
    /// The master writes the branch it selected.
    Select,
}

/// Where a simulated device is in the 1-Wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// Not selected; the device leaves the line alone until the next reset.
    Idle,
    /// Shifting in the ROM command that follows a reset pulse.
    RomCommand { byte: u8, count: u8 },
    /// Taking part in a (alarm) search at ROM bit `position`.
    Search {
        position: u8,
        slot: SearchSlot,
        glitch: bool,
    },
    /// Comparing a Match ROM address against its own ROM, bit by bit.
    Match { position: u8 },
    /// Selected; shifting in a function command.
    Function { byte: u8, count: u8 },
    /// Shifting out `len` bytes of `data`.
    Transmit { data: [u8; 9], len: u8, bit: u8 },
    /// Shifting in the three bytes of a Write Scratchpad command.
    Receive { data: [u8; 3], bit: u8 },
    /// Converting; read slots return zero until `remaining` reaches zero.
    Converting { remaining: u32 },
    /// Answers the next read slot with its power supply mode.
    PowerSupply,
}

/// A simulated 1-Wire device, modelled on the DS18B20.
#[derive(Debug, Clone)]
pub struct SimDevice {
    rom: u64,
    alarm: bool,
    parasite: bool,
    temperature: i16,
    conversion_slots: u32,
    crc_glitches: u32,
    resets_left: Option<u32>,
    scratchpad: [u8; 8],
    eeprom: [u8; 3],
    conversions: u32,
    state: DeviceState,
}

impl SimDevice {
    /// A device with the given ROM code.
    pub fn new(rom: u64) -> Self {
        Self {
            rom,
            alarm: false,
            parasite: false,
            temperature: 0x0550,
            conversion_slots: 3,
            crc_glitches: 0,
            resets_left: None,
            scratchpad: POWER_ON_SCRATCHPAD,
            eeprom: [POWER_ON_SCRATCHPAD[2], POWER_ON_SCRATCHPAD[3], POWER_ON_SCRATCHPAD[4]],
            conversions: 0,
            state: DeviceState::Idle,
        }
    }

    /// A device of the given family with a random serial number.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, family: u8) -> Self {
        Self::new(rom_with_crc(family, rng.random()))
    }

    /// Puts the device in alarm state; it then answers alarm searches.
    pub fn with_alarm(mut self, alarm: bool) -> Self {
        self.alarm = alarm;
        self
    }

    /// Makes the device report parasite power.
    pub fn with_parasite_power(mut self, parasite: bool) -> Self {
        self.parasite = parasite;
        self
    }

    /// Raw temperature register (1/16 degC) produced by the next conversion.
    pub fn with_temperature_raw(mut self, raw: i16) -> Self {
        self.temperature = raw;
        self
    }

    /// Number of read slots that return zero while a conversion runs.
    pub fn with_conversion_slots(mut self, slots: u32) -> Self {
        self.conversion_slots = slots;
        self
    }

    /// Number of upcoming searches in which the device sends the most
    /// significant ROM bit inverted, corrupting the CRC byte.
    pub fn with_crc_glitches(mut self, passes: u32) -> Self {
        self.crc_glitches = passes;
        self
    }

    /// Number of reset pulses the device answers before it drops off the
    /// line for good.
    pub fn with_reset_limit(mut self, resets: u32) -> Self {
        self.resets_left = Some(resets);
        self
    }

    /// The device ROM code.
    pub fn rom(&self) -> u64 {
        self.rom
    }

    /// Current protocol state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Scratchpad contents including the CRC byte.
    pub fn scratchpad(&self) -> [u8; 9] {
        let mut pad = [0; 9];
        pad[..8].copy_from_slice(&self.scratchpad);
        pad[8] = OneWireCrc::compute(&self.scratchpad);
        pad
    }

    /// T_H, T_L and configuration bytes saved by Copy Scratchpad.
    pub fn eeprom(&self) -> [u8; 3] {
        self.eeprom
    }

    /// Number of conversions started.
    pub fn conversions(&self) -> u32 {
        self.conversions
    }

    /// Reset pulse.
    ///
    /// # Returns
    /// `true` if the device answered with a presence pulse.
    pub(crate) fn reset(&mut self) -> bool {
        match self.resets_left {
            Some(0) => {
                self.state = DeviceState::Idle;
                return false;
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        self.state = DeviceState::RomCommand { byte: 0, count: 0 };
        true
    }

    fn rom_bit(&self, position: u8, glitch: bool) -> bool {
        let bit = self.rom >> position & 1 == 1;
        if glitch && position == 63 { !bit } else { bit }
    }

    /// One time slot. `master` is `false` for a write-zero slot and `true` for
    /// a write-one or read slot.
    ///
    /// # Returns
    /// `false` if the device pulls the line low during the slot.
    pub(crate) fn frame(&mut self, master: bool) -> Result<bool, SimError> {
        let state = core::mem::replace(&mut self.state, DeviceState::Idle);
        let (next, line) = self.transition(state, master)?;
        self.state = next;
        Ok(line)
    }

    /// The transition table: current state and master slot to next state and
    /// line level.
    fn transition(
        &mut self,
        state: DeviceState,
        master: bool,
    ) -> Result<(DeviceState, bool), SimError> {
        use DeviceState::*;
        Ok(match state {
            Idle => (Idle, true),
            RomCommand { byte, count } => {
                let byte = byte | u8::from(master) << count;
                if count < 7 {
                    (RomCommand { byte, count: count + 1 }, true)
                } else {
                    (self.rom_command(byte)?, true)
                }
            }
            Search {
                position,
                slot: SearchSlot::Bit,
                glitch,
            } => {
                if !master {
                    return Err(SimError::WriteDuringRead);
                }
                let next = Search {
                    position,
                    slot: SearchSlot::Complement,
                    glitch,
                };
                (next, self.rom_bit(position, glitch))
            }
            Search {
                position,
                slot: SearchSlot::Complement,
                glitch,
            } => {
                if !master {
                    return Err(SimError::WriteDuringRead);
                }
                let next = Search {
                    position,
                    slot: SearchSlot::Select,
                    glitch,
                };
                (next, !self.rom_bit(position, glitch))
            }
            Search {
                position,
                slot: SearchSlot::Select,
                glitch,
            } => {
                if master != self.rom_bit(position, glitch) {
                    log::trace!("{:016x} withdrawing from search at bit {position}", self.rom);
                    (Idle, true)
                } else if position == 63 {
                    log::trace!("{:016x} is the found device", self.rom);
                    (Idle, true)
                } else {
                    let next = Search {
                        position: position + 1,
                        slot: SearchSlot::Bit,
                        glitch,
                    };
                    (next, true)
                }
            }
            Match { position } => {
                if master != self.rom_bit(position, false) {
                    (Idle, true)
                } else if position == 63 {
                    (Function { byte: 0, count: 0 }, true)
                } else {
                    (Match { position: position + 1 }, true)
                }
            }
            Function { byte, count } => {
                let byte = byte | u8::from(master) << count;
                if count < 7 {
                    (Function { byte, count: count + 1 }, true)
                } else {
                    (self.function_command(byte)?, true)
                }
            }
            Transmit { data, len, bit } => {
                let line = data[usize::from(bit / 8)] >> (bit % 8) & 1 == 1;
                let bit = bit + 1;
                if bit == len * 8 {
                    (Idle, line)
                } else {
                    (Transmit { data, len, bit }, line)
                }
            }
            Receive { mut data, bit } => {
                data[usize::from(bit / 8)] |= u8::from(master) << (bit % 8);
                if bit == 23 {
                    self.scratchpad[2..5].copy_from_slice(&data);
                    (Idle, true)
                } else {
                    (Receive { data, bit: bit + 1 }, true)
                }
            }
            Converting { remaining } => {
                if remaining == 0 {
                    (Converting { remaining }, true)
                } else {
                    (Converting { remaining: remaining - 1 }, false)
                }
            }
            PowerSupply => (Idle, !self.parasite),
        })
    }

    fn rom_command(&mut self, byte: u8) -> Result<DeviceState, SimError> {
        let cmd = Command::try_from(byte).map_err(SimError::UnsupportedCommand)?;
        Ok(match cmd {
            Command::SearchRom => self.start_search(),
            Command::AlarmSearch if self.alarm => self.start_search(),
            Command::AlarmSearch => DeviceState::Idle,
            Command::MatchRom => DeviceState::Match { position: 0 },
            Command::SkipRom => DeviceState::Function { byte: 0, count: 0 },
            Command::ReadRom => {
                let mut data = [0; 9];
                data[..8].copy_from_slice(&self.rom.to_le_bytes());
                DeviceState::Transmit { data, len: 8, bit: 0 }
            }
            other => return Err(SimError::UnsupportedCommand(other.code())),
        })
    }

    fn start_search(&mut self) -> DeviceState {
        let glitch = self.crc_glitches > 0;
        if glitch {
            self.crc_glitches -= 1;
        }
        DeviceState::Search {
            position: 0,
            slot: SearchSlot::Bit,
            glitch,
        }
    }

    fn function_command(&mut self, byte: u8) -> Result<DeviceState, SimError> {
        let cmd = Command::try_from(byte).map_err(SimError::UnsupportedCommand)?;
        Ok(match cmd {
            Command::ConvertTemp => {
                self.conversions += 1;
                self.scratchpad[..2].copy_from_slice(&self.temperature.to_le_bytes());
                DeviceState::Converting {
                    remaining: self.conversion_slots,
                }
            }
            Command::ReadScratchpad => DeviceState::Transmit {
                data: self.scratchpad(),
                len: 9,
                bit: 0,
            },
            Command::WriteScratchpad => DeviceState::Receive { data: [0; 3], bit: 0 },
            Command::CopyScratchpad => {
                self.eeprom.copy_from_slice(&self.scratchpad[2..5]);
                DeviceState::Idle
            }
            Command::RecallEeprom => {
                self.scratchpad[2..5].copy_from_slice(&self.eeprom);
                DeviceState::Idle
            }
            Command::ReadPowerSupply => DeviceState::PowerSupply,
            other => return Err(SimError::UnsupportedCommand(other.code())),
        })
    }
}
