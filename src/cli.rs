//! CLI argument parsing

use clap::{Parser, Subcommand};
use eeprog_serial::protocol::{SERIAL_SPEED, SERIAL_TIMEOUT};
use std::path::PathBuf;

/// ROM image used when no file is given
pub const DEFAULT_FILE: &str = "eep.rom";

/// Parse a size or address value
///
/// Values are hexadecimal unless suffixed with `d` (e.g. `100d`). A `0x`
/// prefix is accepted on hex values.
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(dec) = s.strip_suffix('d') {
        dec.parse::<u32>()
            .map_err(|e| format!("Invalid decimal value {:?}: {}", s, e))
    } else {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value {:?}: {}", s, e))
    }
}

/// Start address with an optional inclusive end address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u32,
    pub end: Option<u32>,
}

/// Parse `START` or `START-END`
pub fn parse_address_range(s: &str) -> Result<AddressRange, String> {
    match s.split_once('-') {
        Some((start, end)) => Ok(AddressRange {
            start: parse_number(start)?,
            end: Some(parse_number(end)?),
        }),
        None => Ok(AddressRange {
            start: parse_number(s)?,
            end: None,
        }),
    }
}

#[derive(Parser)]
#[command(name = "eeprog")]
#[command(author, version, about = "EEPROM programmer host driver", long_about = None)]
#[command(after_help = "Address and size values are hexadecimal unless followed by a 'd' (ex: \"100d\").\n\
Starting address and total size must be multiples of 40 (64 decimal).\n\
Total ROM size is 8000 (32768 decimal).")]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Mirror every serial line sent and received to the log
    #[arg(long, global = true)]
    pub debug_serial: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Transfer options shared by read and write
#[derive(clap::Args, Debug, Clone)]
pub struct TransferArgs {
    /// Serial device (defaults to the first /dev/cu.usbmodem* or /dev/ttyACM* found)
    #[arg(short, long, conflicts_with = "emulate")]
    pub device: Option<String>,

    /// Talk to an in-memory emulated programmer instead of a serial device
    #[arg(long)]
    pub emulate: bool,

    /// Start address, or inclusive range START-END
    #[arg(short, long, value_parser = parse_address_range)]
    pub address: Option<AddressRange>,

    /// Size in bytes
    #[arg(short, long, value_parser = parse_number)]
    pub size: Option<u32>,

    /// ROM image to read to or write from
    #[arg(short, long, default_value = DEFAULT_FILE)]
    pub file: PathBuf,

    /// Serial baud rate
    #[arg(short, long, default_value_t = SERIAL_SPEED)]
    pub baud: u32,

    /// Seconds to wait for each response line
    #[arg(short, long, default_value_t = SERIAL_TIMEOUT.as_secs())]
    pub timeout: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read EEPROM contents to a file
    Read {
        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Write a file to the EEPROM
    Write {
        #[command(flatten)]
        transfer: TransferArgs,
    },
}
