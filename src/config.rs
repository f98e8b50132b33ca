//! Resolution of command-line options into a transfer configuration
//!
//! Everything here runs before the serial device is opened, so no bad
//! request ever reaches the programmer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eeprog_serial::protocol::EEPROM_SIZE;
use eeprog_serial::{Direction, EeprogError, TransferRequest};
use thiserror::Error;

use crate::cli::TransferArgs;

/// Device globs searched, in order, when no device is given
pub const DEFAULT_DEVICE_PATTERNS: &[&str] = &["/dev/cu.usbmodem*", "/dev/ttyACM*"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No device specified, and default device not found.")]
    NoDevice,

    #[error("Device path not found ({0}).")]
    DeviceNotFound(String),

    #[error("File to write not found ({}).", .0.display())]
    FileNotFound(PathBuf),

    #[error("Address range end 0x{end:04X} is before start 0x{start:04X}.")]
    RangeReversed { start: u32, end: u32 },

    #[error("{0}")]
    Request(#[from] EeprogError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the transfer is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Serial(String),
    Emulated,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Serial(device) => f.write_str(device),
            Target::Emulated => f.write_str("emulated programmer"),
        }
    }
}

/// Fully resolved parameters of one run
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub mode: Direction,
    pub target: Target,
    pub request: TransferRequest,
    pub file: PathBuf,
    pub baud: u32,
    pub timeout: Duration,
}

impl TransferConfig {
    /// Resolve and validate the options for `mode`
    pub fn resolve(mode: Direction, args: &TransferArgs) -> Result<Self, ConfigError> {
        let target = if args.emulate {
            Target::Emulated
        } else {
            let device = match &args.device {
                Some(device) => device.clone(),
                None => find_default_device().ok_or(ConfigError::NoDevice)?,
            };
            if !Path::new(&device).exists() {
                return Err(ConfigError::DeviceNotFound(device));
            }
            Target::Serial(device)
        };

        let file_len = match mode {
            Direction::Write => {
                if !args.file.exists() {
                    return Err(ConfigError::FileNotFound(args.file.clone()));
                }
                Some(std::fs::metadata(&args.file)?.len())
            }
            Direction::Read => None,
        };

        let start = args.address.map_or(0, |a| a.start);
        let end = args.address.and_then(|a| a.end);
        let size = resolve_size(start, end, args.size, file_len)?;
        let request = TransferRequest::new(mode, start, size)?;

        Ok(Self {
            mode,
            target,
            request,
            file: args.file.clone(),
            baud: args.baud,
            timeout: Duration::from_secs(args.timeout),
        })
    }
}

/// Pick the transfer size
///
/// An explicit size wins, then an address range end, then the size of the
/// file being written, then the remainder of the device.
pub fn resolve_size(
    start: u32,
    end: Option<u32>,
    size: Option<u32>,
    file_len: Option<u64>,
) -> Result<u32, ConfigError> {
    if let Some(size) = size {
        return Ok(size);
    }
    if let Some(end) = end {
        if end < start {
            return Err(ConfigError::RangeReversed { start, end });
        }
        return Ok(end - start + 1);
    }
    if let Some(len) = file_len {
        return Ok(u32::try_from(len).unwrap_or(u32::MAX));
    }
    Ok(EEPROM_SIZE.saturating_sub(start))
}

/// First existing path matching [`DEFAULT_DEVICE_PATTERNS`]
pub fn find_default_device() -> Option<String> {
    DEFAULT_DEVICE_PATTERNS.iter().find_map(|pattern| {
        let mut matches = glob::glob(pattern).ok()?.filter_map(|entry| entry.ok());
        let first = matches.next()?;
        log::debug!("Using default device {}", first.display());
        Some(first.to_string_lossy().into_owned())
    })
}
