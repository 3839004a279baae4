//! Entry keys and kinds.

use std::fmt;

use classfs_vfs::VfsPath;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A normalized entry key: an internal class name (`pkg/A`) or an
/// archive-relative resource path (`META-INF/MANIFEST.MF`).
pub type EntryKey = String;

/// Which namespace a key belongs to. Fixed when the key is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Class,
    Resource,
}

impl EntryKind {
    pub fn is_class(self) -> bool {
        self == EntryKind::Class
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Class => write!(f, "class"),
            EntryKind::Resource => write!(f, "resource"),
        }
    }
}

/// Convert a binary name (`pkg.Outer$Inner`) to an internal name
/// (`pkg/Outer$Inner`).
pub fn internal_name(binary: &str) -> String {
    binary.replace('.', "/")
}

/// Convert an internal name to the binary name a runtime expects.
pub fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// The canonical backing path of a key's raw slot.
pub fn key_path(key: &str) -> Result<VfsPath> {
    VfsPath::from_key(key).map_err(|source| Error::InvalidKey {
        key: key.to_string(),
        source,
    })
}
