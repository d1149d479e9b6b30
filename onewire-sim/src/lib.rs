//! # onewire-sim
//! A simulated serial line with 1-Wire devices attached.
//!
//! [SimUart] implements [`Transport`](uart_onewire::Transport) and answers the
//! byte frames that [`UartOneWire`](uart_onewire::UartOneWire) sends the way a
//! UART wired to a real bus would: `0xf0` at reset speed echoes `0xe0` when any
//! device is attached, a `0x00`/`0xff` slot at signalling speed echoes `0xff`
//! unless some [SimDevice] pulls the line low, in which case it echoes `0xfe`.
//!
//! Only meant for tests; nothing in the driver depends on it.

mod device;
mod uart;

pub use device::{DeviceState, SearchSlot, SimDevice, rom_with_crc};
pub use uart::SimUart;

use uart_onewire::BaudRate;

/// Errors raised by the simulated line when the master breaks the protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// A byte was written before any baud rate was configured.
    #[error("baud rate not configured")]
    BaudNotSet,
    /// A byte that is not a valid frame at the current speed.
    #[error("cannot send {byte:#04x} at {baud:?}")]
    UnexpectedFrame {
        /// The configured speed.
        baud: BaudRate,
        /// The offending byte.
        byte: u8,
    },
    /// The master wrote a zero where a device expected a read slot.
    #[error("write-zero slot where a read slot was expected")]
    WriteDuringRead,
    /// A command the simulated devices do not implement.
    #[error("unsupported command {0:#04x}")]
    UnsupportedCommand(u8),
}
