//! Centralized error types for msgpeek.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the msgpeek library.
///
/// Only a handful of these ever reach the caller of [`crate::reader::read`]:
/// problems local to one property stream or one header line are logged and
/// the affected field is left empty instead.
#[derive(Error, Debug)]
pub enum MsgError {
    /// A caller-supplied window does not fit inside its backing buffer.
    #[error("Window [{offset}, {offset}+{length}) exceeds buffer of {available} bytes")]
    InvalidWindow {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// The compound file signature is present but the buffer ends before
    /// the header fields that describe the rest of the file.
    #[error("Compound file header truncated: need {needed} bytes, have {available}")]
    TruncatedHeader { needed: usize, available: usize },

    /// The compound file header describes an impossible layout.
    #[error("Invalid compound file header: {0}")]
    InvalidHeader(String),

    /// A read fell outside the current window.
    #[error("Read of {length} bytes at offset {offset} is out of bounds")]
    OutOfBounds { offset: usize, length: usize },

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A configuration value is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, MsgError>`.
pub type Result<T> = std::result::Result<T, MsgError>;

impl MsgError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error aborts a read outright instead of letting the next
    /// strategy take over.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidWindow { .. } | Self::TruncatedHeader { .. }
        )
    }
}
