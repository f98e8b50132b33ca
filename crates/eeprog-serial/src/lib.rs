//! eeprog-serial - EEPROG programmer protocol support
//!
//! This crate implements the host side of the EEPROG line protocol used by
//! microcontroller-based parallel EEPROM programmers.
//!
//! # Protocol Overview
//!
//! Every exchange is a newline-terminated ASCII line. After a `version`
//! handshake the host moves data in chunks of up to 8 pages of 64 bytes:
//!
//! ```text
//! host   -> chunkr 0140 8
//! device <- OKAY: ...
//! device <- 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
//! ...
//! ```
//!
//! Any unexpected line, timeout, or `FAIL:` reply ends the transfer.
//!
//! # Example
//!
//! ```no_run
//! use eeprog_serial::protocol::SERIAL_TIMEOUT;
//! use eeprog_serial::{Direction, Eeprog, SerialTransport, TransferRequest};
//!
//! let transport = SerialTransport::open("/dev/ttyACM0", Some(115200), SERIAL_TIMEOUT)?;
//! let mut eeprog = Eeprog::new(transport)?;
//! println!("Firmware v{}", eeprog.version());
//!
//! let request = TransferRequest::new(Direction::Read, 0x0000, 0x0400)?;
//! let data = eeprog.read(&request, &mut ())?;
//! println!("Read {} bytes", data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod emulator;
pub mod error;
pub mod line;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod mock;

use std::time::Duration;

// Re-exports
pub use device::{Eeprog, TransferProgress};
pub use emulator::{EmulatedEeprom, EmulatorConfig};
pub use error::{EeprogError, Result};
pub use line::{Expectation, LineChannel, LineMatch, Matched, Matcher};
pub use protocol::{Chunk, Direction, FirmwareVersion, TransferRequest};
pub use transport::serial::SerialTransport;
pub use transport::Transport;

/// Open an EEPROG connection via serial port and perform the handshake
///
/// `timeout` bounds the wait for each response line. With `debug` set, every
/// line exchanged is mirrored to the log.
pub fn open_serial(
    device: &str,
    baud: Option<u32>,
    timeout: Duration,
    debug: bool,
) -> Result<Eeprog<SerialTransport>> {
    let transport = SerialTransport::open(device, baud, timeout)?;
    let mut channel = LineChannel::new(transport);
    channel.set_timeout(timeout);
    channel.set_debug(debug);
    Eeprog::with_channel(channel)
}
