//! Command codes for 1-Wire communication.

/// ROM and function commands understood by the devices this crate talks to.
///
/// ROM commands (search, read, match, skip) follow every reset pulse and
/// select which devices listen. Function commands follow a ROM command and
/// act on the selected device(s).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Initiates a single temperature conversion.
    ConvertTemp = 0x44,
    /// Reads the contents of the scratchpad, including the trailing CRC byte.
    ReadScratchpad = 0xbe,
    /// Writes 3 bytes of data (T_H, T_L, configuration) to the scratchpad.
    WriteScratchpad = 0x4e,
    /// Copies the T_H, T_L and configuration bytes of the scratchpad to EEPROM.
    CopyScratchpad = 0x48,
    /// Recalls the alarm thresholds and configuration from EEPROM into the scratchpad.
    RecallEeprom = 0xb8,
    /// Asks the addressed devices whether any of them uses parasite power.
    ReadPowerSupply = 0xb4,
    /// Search for devices on the 1-Wire bus.
    SearchRom = 0xf0,
    /// Read the ROM code of the single device on the bus.
    ReadRom = 0x33,
    /// Match a specific 64-bit ROM code.
    MatchRom = 0x55,
    /// Address every device on the bus at once.
    SkipRom = 0xcc,
    /// Search for devices in alarm state on the 1-Wire bus.
    AlarmSearch = 0xec,
}

impl Command {
    /// The byte transmitted on the bus for this command.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for commands that are valid directly after a reset pulse.
    pub const fn is_rom_command(self) -> bool {
        matches!(
            self,
            Command::SearchRom
                | Command::ReadRom
                | Command::MatchRom
                | Command::SkipRom
                | Command::AlarmSearch
        )
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd.code()
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Command::*;
        match value {
            0x44 => Ok(ConvertTemp),
            0xbe => Ok(ReadScratchpad),
            0x4e => Ok(WriteScratchpad),
            0x48 => Ok(CopyScratchpad),
            0xb8 => Ok(RecallEeprom),
            0xb4 => Ok(ReadPowerSupply),
            0xf0 => Ok(SearchRom),
            0x33 => Ok(ReadRom),
            0x55 => Ok(MatchRom),
            0xcc => Ok(SkipRom),
            0xec => Ok(AlarmSearch),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn codes_match_the_wire_values() {
        assert_eq!(Command::ConvertTemp.code(), 0x44);
        assert_eq!(Command::ReadScratchpad.code(), 0xbe);
        assert_eq!(Command::WriteScratchpad.code(), 0x4e);
        assert_eq!(Command::CopyScratchpad.code(), 0x48);
        assert_eq!(Command::RecallEeprom.code(), 0xb8);
        assert_eq!(Command::ReadPowerSupply.code(), 0xb4);
        assert_eq!(Command::SearchRom.code(), 0xf0);
        assert_eq!(Command::ReadRom.code(), 0x33);
        assert_eq!(Command::MatchRom.code(), 0x55);
        assert_eq!(Command::SkipRom.code(), 0xcc);
        assert_eq!(Command::AlarmSearch.code(), 0xec);
    }

    #[test]
    fn try_from_inverts_code() {
        for byte in 0..=u8::MAX {
            if let Ok(cmd) = Command::try_from(byte) {
                assert_eq!(cmd.code(), byte);
            }
        }
        assert_eq!(Command::try_from(0x00), Err(0x00));
        assert!(Command::MatchRom.is_rom_command());
        assert!(!Command::ConvertTemp.is_rom_command());
    }
}
