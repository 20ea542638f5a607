//! Error types shared across the bring-up engine.
//!
//! None of these cross the command channel. Every public operation converts
//! them into a single [`OpResult`](crate::domain::models::OpResult) after
//! logging.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to get a command onto the channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    #[error("no command buffer available")]
    NoBuffer,
    #[error("command 0x{opcode:04X} does not fit in its buffer")]
    Overflow { opcode: u16 },
    #[error("channel rejected command 0x{opcode:04X}")]
    Rejected { opcode: u16 },
}

/// Failure to frame a command into an [`HciBuffer`](crate::hci::HciBuffer).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("command needs {needed} bytes but the buffer holds {capacity}")]
    TooSmall { needed: usize, capacity: usize },
    #[error("parameter block of {0} bytes exceeds 255")]
    ParamsTooLong(usize),
}

/// Why no patch file could be selected.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("could not open patch directory {path}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not find patchfile {chip_id} at {dir}")]
    NotFound { chip_id: String, dir: PathBuf },
    #[error("invalid patchfile name (too long): {0}")]
    PathTooLong(PathBuf),
}

/// Rejected configuration entry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown configuration key {0:?}")]
    UnknownKey(String),
    #[error("value for {key} is longer than {max} bytes")]
    ValueTooLong { key: &'static str, max: usize },
    #[error("invalid settlement delay {0:?}")]
    InvalidDelay(String),
    #[error("line {line}: expected `key = value`")]
    Malformed { line: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
