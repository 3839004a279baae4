//! On-disk backing rooted at a local directory.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{Backing, Result, VfsError, VfsPath};

/// A backing that stores each path as a file below a root directory.
///
/// Used when history and current bytes should survive the process. The root
/// must exist, be a directory, and be writable.
pub struct DiskBacking {
    root: PathBuf,
}

impl DiskBacking {
    /// Open a backing rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<DiskBacking> {
        let root = root.into();
        let attr = fs::metadata(&root).map_err(|error| VfsError::RootInvalid {
            root: root.clone(),
            message: error.to_string(),
        })?;

        if !attr.is_dir() {
            return Err(VfsError::RootInvalid {
                root,
                message: "root path must be a directory".to_string(),
            });
        }

        if attr.permissions().readonly() {
            return Err(VfsError::RootInvalid {
                root,
                message: "root directory must be writable".to_string(),
            });
        }

        match root.canonicalize() {
            Ok(root) => Ok(DiskBacking { root }),
            Err(error) => Err(VfsError::RootInvalid {
                root,
                message: error.to_string(),
            }),
        }
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &VfsPath) -> PathBuf {
        let mut file_path = self.root.clone();
        file_path.extend(path.components());
        file_path
    }

    fn create_parents(&self, path: &VfsPath, file_path: &Path) -> Result<()> {
        let Some(parent) = file_path.parent() else {
            return Ok(());
        };
        fs::create_dir_all(parent).map_err(|error| {
            if parent.is_file() || error.kind() == std::io::ErrorKind::NotADirectory {
                VfsError::NotDirectory {
                    path: path.parent().unwrap_or_default(),
                }
            } else {
                VfsError::from_io(path, "create_dir", error)
            }
        })
    }
}

impl Backing for DiskBacking {
    fn read(&self, path: &VfsPath) -> Result<Bytes> {
        let file_path = self.file_path(path);
        tracing::debug!(file = %file_path.display(), "reading");

        if file_path.is_dir() {
            return Err(VfsError::IsDirectory { path: path.clone() });
        }
        fs::read(&file_path)
            .map(Bytes::from)
            .map_err(|error| VfsError::from_io(path, "read", error))
    }

    fn write(&self, path: &VfsPath, data: Bytes) -> Result<()> {
        let file_path = self.file_path(path);
        tracing::debug!(file = %file_path.display(), len = data.len(), "writing");

        if path.is_root() || file_path.is_dir() {
            return Err(VfsError::IsDirectory { path: path.clone() });
        }
        self.create_parents(path, &file_path)?;
        fs::write(&file_path, &data).map_err(|error| VfsError::from_io(path, "write", error))
    }

    fn delete(&self, path: &VfsPath) -> Result<()> {
        let file_path = self.file_path(path);
        if file_path.is_dir() {
            return Err(VfsError::IsDirectory { path: path.clone() });
        }
        fs::remove_file(&file_path).map_err(|error| VfsError::from_io(path, "delete", error))
    }

    fn exists(&self, path: &VfsPath) -> bool {
        !path.is_root() && self.file_path(path).is_file()
    }

    fn files(&self) -> Vec<VfsPath> {
        let mut files: Vec<VfsPath> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let key: Vec<&str> = relative
                    .components()
                    .map(|c| c.as_os_str().to_str())
                    .collect::<Option<_>>()?;
                VfsPath::from_key(&key.join("/")).ok()
            })
            .collect();
        files.sort();
        files
    }

    fn rename(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        let source = self.file_path(from);
        let target = self.file_path(to);
        if source.is_dir() {
            return Err(VfsError::IsDirectory { path: from.clone() });
        }
        if target.is_dir() {
            return Err(VfsError::IsDirectory { path: to.clone() });
        }
        self.create_parents(to, &target)?;
        fs::rename(&source, &target).map_err(|error| VfsError::from_io(from, "rename", error))
    }
}
