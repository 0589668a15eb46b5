//! Object-store error types.

use std::io;
use thiserror::Error;

/// Errors raised by an [`ObjectStore`](super::ObjectStore) implementation.
///
/// The only outcome the kernel inspects is [`StoreError::NotFound`]; every
/// other variant is carried upward as an opaque backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object (or bucket) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Key cannot be stored by this backend.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Copy-source identifier could not be parsed.
    #[error("invalid copy source: {0}")]
    InvalidCopySource(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create an InvalidKey error.
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Create an InvalidCopySource error.
    pub fn invalid_copy_source(source: impl Into<String>) -> Self {
        Self::InvalidCopySource(source.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true for the distinguishable "not found" (404) outcome.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => is_missing(e),
            _ => false,
        }
    }
}

/// I/O errors meaning "nothing at this path".
///
/// A path running through a plain file (`a/x` when `a` is a file) fails with
/// `NotADirectory`; for an object key that is just as absent as `NotFound`.
pub(crate) fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Object-store result type.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(StoreError::not_found("a/b").is_not_found());
        let gone = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(StoreError::Io(gone).is_not_found());
        assert!(!StoreError::other("boom").is_not_found());
        assert!(!StoreError::invalid_key("../x").is_not_found());
    }

    #[test]
    fn test_not_a_directory_is_not_found() {
        let err = StoreError::Io(io::Error::new(io::ErrorKind::NotADirectory, "file"));
        assert!(err.is_not_found());

        let denied = StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(!denied.is_not_found());
    }
}
