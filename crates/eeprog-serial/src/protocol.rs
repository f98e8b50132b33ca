//! EEPROG protocol constants and types
//!
//! All traffic is newline-terminated ASCII. Payload bytes travel as lines of
//! 16 space-separated, upper-case, two-digit hex values.

use core::fmt;
use std::time::Duration;

use crate::error::{EeprogError, Result};

/// Default serial speed of the programmer firmware
pub const SERIAL_SPEED: u32 = 115_200;
/// Read timeout applied to every blocking line read
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Total EEPROM capacity in bytes
pub const EEPROM_SIZE: u32 = 32_768;
/// Page size; every transfer is aligned to it
pub const PAGE_SIZE: u32 = 64;
/// Maximum pages moved by one `chunkr`/`chunkw` exchange
pub const MAX_CHUNK_PAGES: u32 = 8;
/// Payload bytes carried by one hex line
pub const BYTES_PER_LINE: usize = 16;
/// Hex lines per page
pub const LINES_PER_PAGE: u32 = PAGE_SIZE / BYTES_PER_LINE as u32;

/// Pause after each payload line written to the firmware.
///
/// The firmware's serial input buffer overflows if lines arrive back to
/// back, after which CTS sticks and writes stall.
pub const WRITE_LINE_DELAY: Duration = Duration::from_millis(1);

/// Command requesting the firmware identity
pub const CMD_VERSION: &str = "version";
/// Command prefix for a paged read
pub const CMD_CHUNK_READ: &str = "chunkr";
/// Command prefix for a paged write
pub const CMD_CHUNK_WRITE: &str = "chunkw";

/// Optional greeting emitted by the firmware at boot
pub const GREETING: &str = "EEPROG Ready";
/// Version reply, captures major/minor/patch
pub const VERSION_PATTERN: &str = r"EEPROG v([0-9]+)\.([0-9]+)\.([0-9]+)";
/// Chunk accepted
pub const OKAY_PATTERN: &str = r"OKAY: .+";
/// Chunk rejected
pub const FAIL_PATTERN: &str = r"FAIL: .+";

/// Highest firmware major version this host understands
pub const VERSION_MAX_MAJOR: u32 = 0;
/// Oldest firmware this host works with
pub const VERSION_MIN: FirmwareVersion = FirmwareVersion::new(0, 1, 0);

/// Firmware version reported by `EEPROG vMAJOR.MINOR.PATCH`
///
/// Ordering is lexicographic over (major, minor, patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Check this version against the supported window.
    ///
    /// A major above [`VERSION_MAX_MAJOR`] is rejected before the minimum is
    /// considered.
    pub fn check_supported(&self) -> Result<()> {
        if self.major > VERSION_MAX_MAJOR {
            return Err(EeprogError::VersionTooNew(*self));
        }
        if *self < VERSION_MIN {
            return Err(EeprogError::VersionTooOld {
                found: *self,
                required: VERSION_MIN,
            });
        }
        Ok(())
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    Read,
    /// Host to device
    Write,
}

impl Direction {
    /// Command word for a chunk in this direction
    pub fn command(self) -> &'static str {
        match self {
            Direction::Read => CMD_CHUNK_READ,
            Direction::Write => CMD_CHUNK_WRITE,
        }
    }

    /// Lower-case name used in messages
    pub fn name(self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated, page-aligned byte range on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    pub start_address: u32,
    pub length: u32,
}

impl TransferRequest {
    /// Build a request, enforcing page alignment and device capacity
    pub fn new(direction: Direction, start_address: u32, length: u32) -> Result<Self> {
        if start_address % PAGE_SIZE != 0 {
            return Err(EeprogError::InvalidRequest(format!(
                "beginning address must be on a {} byte boundary",
                PAGE_SIZE
            )));
        }
        if length % PAGE_SIZE != 0 {
            return Err(EeprogError::InvalidRequest(format!(
                "data size must be a multiple of {}",
                PAGE_SIZE
            )));
        }
        if length == 0 {
            return Err(EeprogError::InvalidRequest("data size of zero".into()));
        }
        match start_address.checked_add(length) {
            Some(end) if end <= EEPROM_SIZE => {}
            _ => {
                return Err(EeprogError::InvalidRequest(format!(
                    "size out of range (> {})",
                    EEPROM_SIZE
                )))
            }
        }
        Ok(Self {
            direction,
            start_address,
            length,
        })
    }

    /// Number of pages covered by the request
    pub fn page_count(&self) -> u32 {
        self.length / PAGE_SIZE
    }

    /// Split the request into chunk exchanges
    pub fn chunks(&self) -> ChunkPlan {
        ChunkPlan {
            address: self.start_address,
            pages_left: self.page_count(),
        }
    }
}

/// One `chunkr`/`chunkw` exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub address: u32,
    pub pages: u32,
}

impl Chunk {
    /// Payload size of this chunk in bytes
    pub fn byte_len(&self) -> usize {
        (self.pages * PAGE_SIZE) as usize
    }

    /// Number of hex lines carrying the payload
    pub fn line_count(&self) -> u32 {
        self.pages * LINES_PER_PAGE
    }

    /// Command line announcing this chunk
    pub fn command(&self, direction: Direction) -> String {
        format!(
            "{} {} {}",
            direction.command(),
            address_string(self.address),
            self.pages
        )
    }
}

/// Iterator over the chunks of a [`TransferRequest`]
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    address: u32,
    pages_left: u32,
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.pages_left == 0 {
            return None;
        }
        let pages = self.pages_left.min(MAX_CHUNK_PAGES);
        let chunk = Chunk {
            address: self.address,
            pages,
        };
        self.pages_left -= pages;
        self.address += pages * PAGE_SIZE;
        Some(chunk)
    }
}

/// Render an address as 4 upper-case hex digits
pub fn address_string(address: u32) -> String {
    format!("{:04X}", address)
}

/// Render a byte as 2 upper-case hex digits
pub fn byte_string(byte: u8) -> String {
    format!("{:02X}", byte)
}

/// Encode bytes as one payload line
pub fn encode_hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|&b| byte_string(b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode one payload line of whitespace-separated hex bytes
pub fn decode_hex_line(line: &str) -> Result<Vec<u8>> {
    line.split_whitespace()
        .map(|token| {
            u8::from_str_radix(token, 16).map_err(|_| {
                EeprogError::InvalidResponse(format!("bad hex byte {:?} in line {:?}", token, line))
            })
        })
        .collect()
}
