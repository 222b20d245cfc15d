//! Error types for the PAK crate.

use chozo_common::{ErrorKind, FourCC, ResourceId};
use thiserror::Error;

/// Errors that can occur when working with PAK archives and the level
/// chunks stored in them.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] chozo_common::Error),

    /// Archive or chunk magic did not match.
    #[error("invalid {what} magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic {
        what: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Unsupported archive or chunk version.
    #[error("unsupported {what} version: {version:#x}")]
    UnsupportedVersion { what: &'static str, version: u32 },

    /// Payload offset/size points outside the archive.
    #[error("entry {id} ({kind}) payload {offset:#x}+{size:#x} exceeds archive length {length:#x}")]
    PayloadOutOfBounds {
        id: ResourceId,
        kind: FourCC,
        offset: u64,
        size: u64,
        length: u64,
    },

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Decompressed size disagrees with the declared size.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(ResourceId),

    /// Entry payload is empty and cannot be streamed.
    #[error("entry {0} has an empty payload")]
    EmptyEntry(ResourceId),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Common(e) => e.kind(),
            Error::UnsupportedVersion { .. } => ErrorKind::Unsupported,
            Error::EntryNotFound(_) => ErrorKind::Missing,
            _ => ErrorKind::Corrupt,
        }
    }
}

/// Result type for PAK operations.
pub type Result<T> = std::result::Result<T, Error>;
