use crate::{Command, OneWire, OneWireError, utils::OneWireCrc};
use alloc::vec::Vec;

/// Default number of times a pass that produced a bad ROM CRC is repeated
/// before giving up.
pub const DEFAULT_MAX_CRC_RETRIES: u8 = 16;

/// A structure for searching devices on a 1-Wire bus.
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It maintains the state of the search.
///
/// The state is a 64-bit discrepancy mask with one bit per ROM bit position.
/// A set bit marks a position where devices disagreed and the search is still
/// walking the `1` branch; it is cleared when the search moves on to the `0`
/// branch. A pass that ends with an empty mask has visited the last device.
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    kind: OneWireSearchKind,
    mask: u64,
    done: bool,
    max_crc_retries: u8,
}

impl<T> core::fmt::Debug for OneWireSearch<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OneWireSearch")
            .field("kind", &self.kind)
            .field("mask", &format_args!("{:#018x}", self.mask))
            .field("done", &self.done)
            .field("max_crc_retries", &self.max_crc_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Type of search performed using [`OneWireSearch`].
pub enum OneWireSearchKind {
    /// Normal search
    Normal,
    /// Search only for devices with alarm
    Alarmed,
}

impl OneWireSearchKind {
    /// The ROM command that starts a pass of this kind.
    pub const fn command(self) -> Command {
        match self {
            OneWireSearchKind::Normal => Command::SearchRom,
            OneWireSearchKind::Alarmed => Command::AlarmSearch,
        }
    }
}

/// Result of a single pass down the search tree.
enum Pass {
    /// Nothing answered the reset pulse.
    Absent,
    /// Every device went quiet in the middle of an alarm search.
    Silent,
    /// A candidate ROM and the mask to continue with.
    Found { rom: u64, mask: u64 },
}

/// Picks the branch to follow where the devices disagree at `position`.
///
/// # Returns
/// The selected bit and the updated discrepancy mask.
///
/// - If `position` is marked in `mask` and it is the highest mark, the `1`
///   branch below it is exhausted: clear the mark and take `0`.
/// - If it is marked but higher marks exist, keep following `1`.
/// - If it is unmarked and nothing above is marked, this is a new
///   discrepancy: mark it and take `1` first.
/// - If it is unmarked but higher marks exist, the `1` branch here was
///   already explored by an earlier pass: take `0`.
pub fn resolve_discrepancy(mask: u64, position: u8) -> (bool, u64) {
    let bit = 1u64 << position;
    let above = mask.checked_shr(u32::from(position) + 1).unwrap_or(0);
    match (mask & bit != 0, above == 0) {
        (true, true) => (false, mask & !bit),
        (true, false) => (true, mask),
        (false, true) => (true, mask | bit),
        (false, false) => (false, mask),
    }
}

impl<'a, T> OneWireSearch<'a, T> {
    /// Creates a new [`OneWireSearch`] instance.
    ///
    /// # Arguments
    /// * `onewire` - A mutable reference to a type that implements the `OneWire` trait.
    /// * `kind` - Whether to look for every device or only those in alarm state.
    pub fn new(onewire: &'a mut T, kind: OneWireSearchKind) -> Self {
        Self {
            onewire,
            kind,
            mask: 0,
            done: false,
            max_crc_retries: DEFAULT_MAX_CRC_RETRIES,
        }
    }

    /// Sets how many times a pass is repeated after it produced a ROM with a
    /// bad CRC.
    pub fn with_max_crc_retries(mut self, retries: u8) -> Self {
        self.max_crc_retries = retries;
        self
    }

    /// The current discrepancy mask.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Resets the search state.
    pub fn restart(&mut self) {
        self.mask = 0;
        self.done = false;
    }
}

impl<T: OneWire> OneWireSearch<'_, T> {
    /// Searches for devices on the 1-Wire bus.
    /// This method implements the 1-Wire search algorithm to discover devices connected to the bus.
    /// The [next](OneWireSearch::next) method can be called repeatedly to find all devices on the bus.
    /// At the end of the search, calling this method will return `None` to indicate that no more devices are present.
    ///
    /// A pass whose ROM fails the CRC check is discarded and repeated from the
    /// mask it started with.
    ///
    /// # Returns
    /// A result containing the ROM code of the found device as a `u64` value.
    ///
    /// | Bit | Description |
    /// |-----|-------------|
    /// | 0-7 | Family code (e.g., 0x28 for DS18B20) |
    /// | 8-55 | Serial number |
    /// | 56-63 | CRC-8 (`0b1_0001_1001` poly) |
    ///
    /// # Errors
    /// [`OneWireError::ProtocolViolation`] if the devices stop answering in
    /// the middle of a normal search. [`OneWireError::ChecksumMismatch`] once
    /// the retries for a bad ROM are used up.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        if self.done {
            return Ok(None);
        }
        let mut retries = 0;
        loop {
            match self.pass(self.mask) {
                Ok(Pass::Found { rom, mask }) if OneWireCrc::validate_rom(rom) => {
                    log::info!("Found device {rom:016x}");
                    self.mask = mask;
                    self.done = mask == 0;
                    return Ok(Some(rom));
                }
                Ok(Pass::Found { rom, .. }) => {
                    if retries >= self.max_crc_retries {
                        self.done = true;
                        return Err(OneWireError::ChecksumMismatch);
                    }
                    retries += 1;
                    log::warn!("Bad CRC on ROM {rom:016x}, trying again ({retries})");
                }
                Ok(Pass::Absent) | Ok(Pass::Silent) => {
                    self.done = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
    }

    /// Runs [next](OneWireSearch::next) until the search is exhausted.
    pub fn collect_all(mut self) -> Result<Vec<u64>, OneWireError<T::BusError>> {
        let mut roms = Vec::new();
        while let Some(rom) = self.next()? {
            roms.push(rom);
        }
        Ok(roms)
    }

    /// One walk from the root of the tree to a leaf.
    fn pass(&mut self, mut mask: u64) -> Result<Pass, OneWireError<T::BusError>> {
        log::debug!("Search pass with mask {mask:#018x}");
        if !self.onewire.reset()? {
            log::warn!("No devices on bus");
            return Ok(Pass::Absent);
        }
        self.onewire.write_command(self.kind.command())?;
        let mut rom = 0u64;
        for position in 0..64u8 {
            // Read the id bit and its complement
            let id_bit = self.onewire.read_bit()?;
            let complement_bit = self.onewire.read_bit()?;
            let set = match (id_bit, complement_bit) {
                (true, true) => {
                    return match self.kind {
                        OneWireSearchKind::Alarmed => Ok(Pass::Silent),
                        OneWireSearchKind::Normal => {
                            log::error!(
                                "No devices responded at bit {position} even though someone responded to a reset"
                            );
                            Err(OneWireError::ProtocolViolation { position })
                        }
                    };
                }
                (false, false) => {
                    let (set, next) = resolve_discrepancy(mask, position);
                    mask = next;
                    set
                }
                // All active devices agree; the id bit is their value
                (id_bit, _) => id_bit,
            };
            if set {
                rom |= 1 << position;
            }
            // Devices whose bit differs drop out until the next reset
            self.onewire.write_bit(set)?;
        }
        Ok(Pass::Found { rom, mask })
    }
}
