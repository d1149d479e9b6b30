#[allow(unused_imports)]
use crate::OneWireSearch;

/// One wire communication error type.
#[derive(Debug, thiserror::Error)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying transport.
    #[error("transport error: {0:?}")]
    Other(E),
    /// A round trip on the UART returned no bytes at all. TX and RX are most
    /// likely not both connected to the 1-Wire line.
    #[error("no echo received on the serial line; are both TX and RX connected to the 1-Wire bus?")]
    WiringFault,
    /// A value outside `0..=255` was handed to a byte write.
    #[error("value is not a byte")]
    InvalidByte,
    /// A bit field wider than 64 bits was handed to an integer write.
    #[error("cannot write {width} bits from a 64-bit value")]
    InvalidWidth {
        /// The requested width.
        width: u32,
    },
    /// No device answered a [`OneWireSearch`] bit slot although the bus reported
    /// presence.
    #[error("no device responded at ROM bit {position} of a search")]
    ProtocolViolation {
        /// ROM bit position (0..64) at which the bus went silent.
        position: u8,
    },
    /// A computed CRC-8 did not reduce to zero.
    #[error("CRC-8 mismatch")]
    ChecksumMismatch,
    /// Indicates that no device is present on the bus.
    #[error("no device present on the bus")]
    NoDevicePresent,
    /// A bounded wait on the bus did not complete in time.
    #[error("timed out waiting for the device")]
    Timeout,
    /// A bounded wait on the bus was cancelled by the caller.
    #[error("wait cancelled")]
    Cancelled,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}
