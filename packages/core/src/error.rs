//! Error types for the core store.

use std::path::PathBuf;

use classfs_vfs::{PathError, VfsError};

use crate::key::EntryKind;
use crate::runtime::HostError;

/// Boxed error returned by codecs and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the core store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value was required but the key has no data.
    #[error("entry not found: {key}")]
    NotFound { key: String },

    /// The key cannot be mapped to a backing path.
    #[error("invalid key '{key}'")]
    InvalidKey {
        key: String,
        #[source]
        source: PathError,
    },

    /// Stored bytes failed to decode.
    #[error("malformed entry {key}")]
    Malformed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// The backing failed.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: VfsError,
    },

    /// Reading or writing a ZIP archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A file outside the backing could not be read or written.
    #[error("file error at {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The host rejected a redefinition batch.
    #[error("redefinition failed")]
    Redefinition(#[source] HostError),

    /// The host could not enumerate its loaded units.
    #[error("host runtime error")]
    Host(#[source] HostError),

    /// The key is already registered under the other kind.
    #[error("key {key} is already registered as a {existing}")]
    KindConflict { key: String, existing: EntryKind },

    /// The workspace was not opened from a live runtime.
    #[error("workspace is not attached to a live runtime")]
    NotLive,

    /// The workspace is retiring or retired.
    #[error("workspace has been retired")]
    Retired,

    /// The configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /// Wrap a backing failure, logging it.
    pub(crate) fn io(context: impl Into<String>, source: VfsError) -> Self {
        let context = context.into();
        tracing::error!(%context, error = %source, "backing failure");
        Error::Io { context, source }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Check if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
