//! Error taxonomy for the emulator core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced through the system to the caller.
#[derive(Debug, Error)]
pub enum C64Error {
    /// A required ROM image was not found anywhere on the search path.
    #[error("{name} ROM not found (searched: {searched})")]
    RomMissing { name: &'static str, searched: String },

    /// A ROM file exists but has the wrong size.
    #[error("{name} ROM at {path} is {actual} bytes, expected {expected}")]
    RomSize {
        name: &'static str,
        path: PathBuf,
        actual: usize,
        expected: usize,
    },

    /// A D64 image failed validation (size, chain, or track/sector range).
    #[error("invalid d64: {0}")]
    InvalidD64(String),

    /// A PRG file is too short to carry its load-address header.
    #[error("invalid prg: {0}")]
    BadPrg(String),

    /// Drive device number outside 8-11.
    #[error("no drive at device {0}")]
    NoSuchDevice(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
