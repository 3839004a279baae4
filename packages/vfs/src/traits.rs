//! The `Backing` trait.

use std::sync::Arc;

use bytes::Bytes;

use crate::{Result, VfsPath};

/// A shared, thread-safe backing.
pub type SharedBacking = Arc<dyn Backing>;

/// Path-addressed byte storage.
///
/// Methods take `&self`: one backing is shared by the cache, the history
/// manager and the live load hook, which run on different threads.
/// Implementations synchronize internally.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn Backing>`.
pub trait Backing: Send + Sync {
    /// Read the bytes stored at `path`.
    ///
    /// # Errors
    ///
    /// * `NotFound` - nothing is stored at the path.
    /// * `IsDirectory` - the path is a directory.
    /// * `Interrupted` - the read was cancelled.
    fn read(&self, path: &VfsPath) -> Result<Bytes>;

    /// Create or overwrite the file at `path`.
    ///
    /// Missing parent directories are created.
    fn write(&self, path: &VfsPath, data: Bytes) -> Result<()>;

    /// Delete the file at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing is stored at the path.
    fn delete(&self, path: &VfsPath) -> Result<()>;

    /// Check if a file is stored at `path`.
    fn exists(&self, path: &VfsPath) -> bool;

    /// Every stored file, sorted.
    fn files(&self) -> Vec<VfsPath>;

    /// Copy the file at `from` to `to`, overwriting `to`.
    fn copy(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        let data = self.read(from)?;
        self.write(to, data)
    }

    /// Move the file at `from` to `to`, overwriting `to`.
    fn rename(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        self.copy(from, to)?;
        self.delete(from)
    }
}

// Blanket implementations for references and smart pointers

impl<T: Backing + ?Sized> Backing for &T {
    fn read(&self, path: &VfsPath) -> Result<Bytes> {
        (**self).read(path)
    }

    fn write(&self, path: &VfsPath, data: Bytes) -> Result<()> {
        (**self).write(path, data)
    }

    fn delete(&self, path: &VfsPath) -> Result<()> {
        (**self).delete(path)
    }

    fn exists(&self, path: &VfsPath) -> bool {
        (**self).exists(path)
    }

    fn files(&self) -> Vec<VfsPath> {
        (**self).files()
    }

    fn copy(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        (**self).copy(from, to)
    }

    fn rename(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        (**self).rename(from, to)
    }
}

impl<T: Backing + ?Sized> Backing for Arc<T> {
    fn read(&self, path: &VfsPath) -> Result<Bytes> {
        self.as_ref().read(path)
    }

    fn write(&self, path: &VfsPath, data: Bytes) -> Result<()> {
        self.as_ref().write(path, data)
    }

    fn delete(&self, path: &VfsPath) -> Result<()> {
        self.as_ref().delete(path)
    }

    fn exists(&self, path: &VfsPath) -> bool {
        self.as_ref().exists(path)
    }

    fn files(&self) -> Vec<VfsPath> {
        self.as_ref().files()
    }

    fn copy(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        self.as_ref().copy(from, to)
    }

    fn rename(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        self.as_ref().rename(from, to)
    }
}
