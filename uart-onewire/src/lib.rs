#![no_std]
#![deny(missing_docs)]
//! # uart-onewire
//! A no-std implementation of the 1-Wire protocol on top of a plain UART.
//!
//! TX and RX of the UART are both wired to the 1-Wire line, TX through an
//! open-drain stage. Each UART frame then becomes a 1-Wire waveform: at 9600
//! baud a single `0xf0` frame is a reset pulse followed by the presence-detect
//! window, and at 115200 baud one frame is one time slot, `0x00` for a zero and
//! `0xff` for a one or a read. The echo received on RX tells what the devices
//! did to the line.
//!
//! [Transport] is the byte channel, [UartOneWire] turns it into a [OneWire]
//! bus, [OneWireSearch] enumerates the devices on it and [OneWireCrc] checks
//! what they send.

extern crate alloc;

mod consts;
mod error;
mod search;
mod traits;
mod transport;
mod uart;
mod utils;
pub use consts::Command;
pub use error::OneWireError;
pub use search::{DEFAULT_MAX_CRC_RETRIES, OneWireSearch, OneWireSearchKind, resolve_discrepancy};
pub use traits::{OneWire, ReadBits};
pub use transport::{BaudRate, Transport};
pub use uart::{UartOneWire, UartOneWireBuilder};
pub use utils::OneWireCrc;

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
