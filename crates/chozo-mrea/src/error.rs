//! Error types for the MREA codec.

use chozo_common::ErrorKind;
use thiserror::Error;

/// Errors raised while decoding or cooking an area.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] chozo_common::Error),

    /// PAK-level error (payload decompression, MLVL).
    #[error("{0}")]
    Pak(#[from] chozo_pak::Error),

    /// Scene or layer file could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Area or section magic did not match.
    #[error("invalid {what} magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic {
        what: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Area version does not belong to any known generation.
    #[error("unsupported {what} version: {version:#x}")]
    UnsupportedVersion { what: &'static str, version: u32 },

    /// A named header slot points outside the section-size table.
    #[error("section index {slot} = {index} out of range (section count {count})")]
    SectionIndex {
        slot: &'static str,
        index: u32,
        count: u32,
    },

    /// The padded section sizes do not fit in the payload.
    #[error("section sizes sum to {total:#x} but only {length:#x} payload bytes exist")]
    SectionOverflow { total: u64, length: u64 },

    /// A block stream seek landed at or beyond the logical stream end.
    #[error("block stream overrun: target {target:#x}, total {total:#x}")]
    StreamOverrun { target: u64, total: u64 },

    /// Structured input for cook is inconsistent.
    #[error("invalid scene: {0}")]
    Scene(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Common(e) => e.kind(),
            Error::Pak(e) => e.kind(),
            Error::UnsupportedVersion { .. } => ErrorKind::Unsupported,
            _ => ErrorKind::Corrupt,
        }
    }
}

/// Result type for MREA operations.
pub type Result<T> = std::result::Result<T, Error>;
