//! Error types for the resource router.

use std::path::PathBuf;

use chozo_common::{ErrorKind, Generation, ResourceId};
use thiserror::Error;

/// Errors raised while building the router or extracting through it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] chozo_common::Error),

    /// PAK container or level chunk error.
    #[error("{0}")]
    Pak(#[from] chozo_pak::Error),

    /// Area codec error.
    #[error("{0}")]
    Mrea(#[from] chozo_mrea::Error),

    /// Working file could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be started.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Archive search pattern was malformed.
    #[error("invalid archive pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A required resource id is not present in any archive.
    #[error("resource {id} not found in any archive")]
    MissingResource { id: ResourceId },

    /// Archives of different generations were mixed in one router.
    #[error("archive {archive} is {actual}, expected {expected}")]
    GenerationMismatch {
        archive: String,
        expected: Generation,
        actual: Generation,
    },

    /// No archives matched.
    #[error("no archives found in {0}")]
    NoArchives(PathBuf),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::ThreadPool(_) => ErrorKind::Io,
            Error::Common(e) => e.kind(),
            Error::Pak(e) => e.kind(),
            Error::Mrea(e) => e.kind(),
            Error::MissingResource { .. } | Error::NoArchives(_) => ErrorKind::Missing,
            Error::GenerationMismatch { .. } | Error::Pattern(_) => ErrorKind::Unsupported,
            Error::Json(_) => ErrorKind::Corrupt,
        }
    }
}

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resource_kind() {
        let err = Error::MissingResource {
            id: ResourceId::new32(0x1234),
        };
        assert_eq!(err.kind(), ErrorKind::Missing);
        assert_eq!(err.to_string(), "resource 00001234 not found in any archive");
    }
}
