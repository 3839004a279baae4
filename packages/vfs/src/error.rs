//! Error types for the byte layer.
//!
//! Only storage-level failures live here. Whether a missing path is an error
//! or an expected "absent" result is decided by the layer above.

use std::path::PathBuf;

use crate::path::{PathError, VfsPath};

/// Errors raised by a [`Backing`](crate::Backing).
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// Nothing is stored at the path.
    #[error("no such file: {path}")]
    NotFound { path: VfsPath },

    /// The path names a directory where a file was expected.
    #[error("is a directory: {path}")]
    IsDirectory { path: VfsPath },

    /// A parent component of the path is a file.
    #[error("not a directory: {path}")]
    NotDirectory { path: VfsPath },

    /// A key could not be mapped to a path.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// The read was cut short by a cancellation (e.g. the owning thread was
    /// interrupted during shutdown).
    #[error("interrupted while accessing {path}")]
    Interrupted { path: VfsPath },

    /// The underlying storage failed.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        path: VfsPath,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An on-disk backing root cannot be used.
    #[error("backing root {} is unusable: {message}", root.display())]
    RootInvalid { root: PathBuf, message: String },
}

impl VfsError {
    /// The path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound { .. })
    }

    /// A benign cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, VfsError::Interrupted { .. })
    }

    /// Classify an I/O error raised while touching `path`.
    pub(crate) fn from_io(path: &VfsPath, operation: &'static str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound { path: path.clone() },
            std::io::ErrorKind::Interrupted => VfsError::Interrupted { path: path.clone() },
            _ => VfsError::Io {
                path: path.clone(),
                operation,
                source: error,
            },
        }
    }
}

/// Result type alias for byte-layer operations.
pub type Result<T> = std::result::Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    fn path() -> VfsPath {
        VfsPath::from_key("pkg/A").unwrap()
    }

    #[test]
    fn display_names_the_path() {
        let e = VfsError::NotFound { path: path() };
        assert_eq!(e.to_string(), "no such file: /pkg/A");

        let e = VfsError::IsDirectory { path: path() };
        assert!(e.to_string().contains("directory"));
    }

    #[test]
    fn io_errors_are_classified() {
        let e = VfsError::from_io(
            &path(),
            "read",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(e.is_not_found());

        let e = VfsError::from_io(
            &path(),
            "read",
            std::io::Error::new(std::io::ErrorKind::Interrupted, "closed"),
        );
        assert!(e.is_interrupted());

        let e = VfsError::from_io(&path(), "write", std::io::Error::other("disk full"));
        assert!(matches!(e, VfsError::Io { operation: "write", .. }));
        assert!(e.source().is_some());
    }

    #[test]
    fn path_error_converts() {
        let e: VfsError = PathError::Empty.into();
        assert!(matches!(e, VfsError::InvalidPath(PathError::Empty)));
    }
}
