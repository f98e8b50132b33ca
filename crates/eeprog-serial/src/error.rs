//! Error types for EEPROG operations

use thiserror::Error;

use crate::protocol::FirmwareVersion;

/// EEPROG-specific errors
///
/// None of these are recoverable within a run: the line protocol has no
/// resynchronization command, so callers are expected to give up on the
/// transfer once one is returned.
#[derive(Debug, Error)]
pub enum EeprogError {
    /// Failed to open or configure the device
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No complete line arrived within the read timeout
    #[error("Communication timeout")]
    Timeout,

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Received line matched none of the expected alternatives
    #[error("Serial expect error: didn't match expected line.\n    Read:     {line}\n    Expected: {expected}")]
    ProtocolMismatch {
        /// The line actually received
        line: String,
        /// Rendered list of the alternatives that were accepted
        expected: String,
    },

    /// Line matched but its content could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Firmware major version is newer than this host supports
    #[error("Firmware version {}.x.x not yet supported (or this program needs updated)", .0.major)]
    VersionTooNew(FirmwareVersion),

    /// Firmware is older than the minimum required version
    #[error("Firmware version {found} is too old; version {required} is required")]
    VersionTooOld {
        found: FirmwareVersion,
        required: FirmwareVersion,
    },

    /// Firmware rejected a chunk with `FAIL: ...`
    #[error("{operation} operation failed - \"{message}\"")]
    ChunkFailed {
        /// "read" or "write"
        operation: &'static str,
        /// The complete `FAIL:` line reported by the firmware
        message: String,
    },

    /// Transfer parameters violate page alignment or capacity
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response pattern failed to compile
    #[error("Invalid response pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),
}

/// Result type for EEPROG operations
pub type Result<T> = core::result::Result<T, EeprogError>;

impl From<std::io::Error> for EeprogError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => EeprogError::Timeout,
            _ => EeprogError::IoError(e.to_string()),
        }
    }
}
