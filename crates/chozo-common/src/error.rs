//! Error types for chozo-common.

use thiserror::Error;

/// Coarse classification of a failure.
///
/// Drivers decide what to do with an error by its kind: `Corrupt` input
/// aborts the whole run, `Missing` resources abort only when the reference
/// was required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Stream position, size table or magic is inconsistent with the data.
    Corrupt,
    /// A resource id could not be routed to any archive entry.
    Missing,
    /// Underlying file system failure.
    Io,
    /// Valid data in a form this toolchain does not handle.
    Unsupported,
}

/// Common error type for chozo operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A cursor was placed beyond the end of a bounded stream.
    #[error("stream cursor overrun: position {position} beyond length {length}")]
    CursorOverrun { position: u64, length: u64 },

    /// Invalid magic value encountered.
    #[error("invalid magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// Value did not match expected.
    #[error("expected value {expected}, got {actual}")]
    ExpectedValue { expected: String, actual: String },

    /// A compressed block or segment failed to inflate.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Unknown release generation string or version number.
    #[error("unknown generation: {0}")]
    UnknownGeneration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// UTF-16 decoding error.
    #[error("invalid UTF-16 string data")]
    Utf16,

    /// Missing null terminator in string.
    #[error("string missing null terminator")]
    MissingNullTerminator,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::UnknownGeneration(_) => ErrorKind::Unsupported,
            _ => ErrorKind::Corrupt,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
