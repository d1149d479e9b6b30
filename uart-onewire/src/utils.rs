#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Calculate CRC-8 used in 1-Wire communications.
///
/// The register is a plain value: start from [`OneWireCrc::new`], feed it bits
/// or bytes, then look at [`OneWireCrc::value`]. Running a sequence followed by
/// its own CRC byte through the register leaves it at zero.
pub struct OneWireCrc(u8);

/// Feedback constant of the `x^8 + x^5 + x^4 + 1` polynomial, reflected.
const FEEDBACK: u8 = 0x8c;

impl OneWireCrc {
    /// A cleared register.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Zero the register.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Shift a single bit through the register.
    pub fn update_bit(&mut self, bit: bool) {
        let fb = (self.0 & 0x1 == 0x1) ^ bit;
        self.0 >>= 1;
        if fb {
            self.0 ^= FEEDBACK;
        }
    }

    /// Update the CRC with the incoming byte, least significant bit first.
    pub fn update(&mut self, byte: u8) {
        for i in 0..8 {
            self.update_bit(byte >> i & 1 == 1);
        }
    }

    /// CRC of a byte sequence.
    pub fn compute(sequence: &[u8]) -> u8 {
        let mut crc = OneWireCrc::new();
        for &byte in sequence.iter() {
            crc.update(byte);
        }
        crc.value()
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        Self::compute(sequence) == 0x0
    }

    /// Validate a 64-bit ROM code: family code, 48-bit serial and the CRC of
    /// both in the top byte.
    pub fn validate_rom(rom: u64) -> bool {
        let mut crc = OneWireCrc::new();
        for i in 0..u64::BITS {
            crc.update_bit(rom >> i & 1 == 1);
        }
        crc.value() == 0x0
    }
}
