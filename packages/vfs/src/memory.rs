//! In-memory backing.

use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{Backing, Result, VfsError, VfsPath};

#[derive(Debug, Clone)]
enum Node {
    File(Bytes),
    Directory,
}

/// A hierarchical byte store held entirely in memory.
///
/// Directories are tracked explicitly so that the store behaves like a small
/// filesystem: writing below a file fails, and directories are created
/// implicitly by writes.
///
/// Locking is a single `RwLock` held only for the map operation itself;
/// payloads are reference-counted `Bytes`, so neither reads nor writes copy
/// data while the lock is held.
///
/// # Example
///
/// ```rust
/// use classfs_vfs::{Backing, MemoryBacking, VfsPath};
/// use bytes::Bytes;
///
/// let vfs = MemoryBacking::new();
/// let res = VfsPath::from_key("META-INF/MANIFEST.MF").unwrap();
/// vfs.write(&res, Bytes::from_static(b"Manifest-Version: 1.0\n")).unwrap();
///
/// assert_eq!(vfs.read(&res).unwrap().len(), 22);
/// assert!(vfs.is_dir(&VfsPath::from_key("META-INF").unwrap()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBacking {
    nodes: RwLock<BTreeMap<VfsPath, Node>>,
}

impl MemoryBacking {
    /// Create an empty backing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backing populated from `(key, bytes)` pairs.
    pub fn with_files<I, K>(files: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Bytes)>,
        K: AsRef<str>,
    {
        let backing = Self::new();
        for (key, data) in files {
            let path = VfsPath::from_key(key.as_ref())?;
            backing.write(&path, data)?;
        }
        Ok(backing)
    }

    /// Check if `path` is a directory. The root always is.
    pub fn is_dir(&self, path: &VfsPath) -> bool {
        path.is_root() || matches!(self.nodes.read().get(path), Some(Node::Directory))
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.nodes
            .read()
            .values()
            .filter(|n| matches!(n, Node::File(_)))
            .count()
    }

    /// Total payload size of all stored files.
    pub fn total_bytes(&self) -> usize {
        self.nodes
            .read()
            .values()
            .map(|n| match n {
                Node::File(b) => b.len(),
                Node::Directory => 0,
            })
            .sum()
    }

    /// Create the parent directories of `path` inside an already-held map.
    fn ensure_parents(nodes: &mut BTreeMap<VfsPath, Node>, path: &VfsPath) -> Result<()> {
        for ancestor in path.ancestors() {
            match nodes.get(&ancestor) {
                Some(Node::Directory) => {}
                Some(Node::File(_)) => return Err(VfsError::NotDirectory { path: ancestor }),
                None => {
                    nodes.insert(ancestor, Node::Directory);
                }
            }
        }
        Ok(())
    }

    fn insert_file(nodes: &mut BTreeMap<VfsPath, Node>, path: &VfsPath, data: Bytes) -> Result<()> {
        if path.is_root() || matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(VfsError::IsDirectory { path: path.clone() });
        }
        Self::ensure_parents(nodes, path)?;
        nodes.insert(path.clone(), Node::File(data));
        Ok(())
    }

    fn file_bytes(nodes: &BTreeMap<VfsPath, Node>, path: &VfsPath) -> Result<Bytes> {
        match nodes.get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Directory) => Err(VfsError::IsDirectory { path: path.clone() }),
            None if path.is_root() => Err(VfsError::IsDirectory { path: path.clone() }),
            None => Err(VfsError::NotFound { path: path.clone() }),
        }
    }
}

impl Backing for MemoryBacking {
    fn read(&self, path: &VfsPath) -> Result<Bytes> {
        Self::file_bytes(&self.nodes.read(), path)
    }

    fn write(&self, path: &VfsPath, data: Bytes) -> Result<()> {
        tracing::trace!(%path, len = data.len(), "vfs.memory.write");
        Self::insert_file(&mut self.nodes.write(), path, data)
    }

    fn delete(&self, path: &VfsPath) -> Result<()> {
        let mut nodes = self.nodes.write();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Directory) => Err(VfsError::IsDirectory { path: path.clone() }),
            None => Err(VfsError::NotFound { path: path.clone() }),
        }
    }

    fn exists(&self, path: &VfsPath) -> bool {
        matches!(self.nodes.read().get(path), Some(Node::File(_)))
    }

    fn files(&self) -> Vec<VfsPath> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, n)| matches!(n, Node::File(_)))
            .map(|(p, _)| p.clone())
            .collect()
    }

    // Both run under one write lock so no reader sees a half-moved file.

    fn copy(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        let mut nodes = self.nodes.write();
        let data = Self::file_bytes(&nodes, from)?;
        Self::insert_file(&mut nodes, to, data)
    }

    fn rename(&self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        let mut nodes = self.nodes.write();
        let data = Self::file_bytes(&nodes, from)?;
        Self::insert_file(&mut nodes, to, data)?;
        if from != to {
            nodes.remove(from);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn p(key: &str) -> VfsPath {
        VfsPath::from_key(key).unwrap()
    }

    #[test]
    fn write_then_read() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("pkg/A"), Bytes::from_static(b"abc")).unwrap();
        assert_eq!(vfs.read(&p("pkg/A")).unwrap(), Bytes::from_static(b"abc"));
        assert!(vfs.exists(&p("pkg/A")));
    }

    #[test]
    fn overwrite_replaces_payload() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("k"), Bytes::from_static(b"first")).unwrap();
        vfs.write(&p("k"), Bytes::from_static(b"second")).unwrap();
        assert_eq!(vfs.read(&p("k")).unwrap(), Bytes::from_static(b"second"));
        assert_eq!(vfs.file_count(), 1);
    }

    #[test]
    fn read_missing_is_not_found() {
        let vfs = MemoryBacking::new();
        assert!(vfs.read(&p("nope")).unwrap_err().is_not_found());
        assert!(!vfs.exists(&p("nope")));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let vfs = MemoryBacking::new();
        assert!(vfs.delete(&p("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_removes_file_only() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("a/b"), Bytes::from_static(b"x")).unwrap();
        vfs.delete(&p("a/b")).unwrap();
        assert!(!vfs.exists(&p("a/b")));
        assert!(vfs.is_dir(&p("a")));
    }

    #[test]
    fn directories_created_implicitly() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("com/example/deep/Main"), Bytes::new()).unwrap();
        assert!(vfs.is_dir(&p("com")));
        assert!(vfs.is_dir(&p("com/example/deep")));
        assert!(!vfs.exists(&p("com/example")));
    }

    #[test]
    fn directory_reads_and_writes_fail() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("a/b"), Bytes::new()).unwrap();
        assert!(matches!(
            vfs.read(&p("a")),
            Err(VfsError::IsDirectory { .. })
        ));
        assert!(matches!(
            vfs.write(&p("a"), Bytes::new()),
            Err(VfsError::IsDirectory { .. })
        ));
        assert!(matches!(
            vfs.delete(&p("a")),
            Err(VfsError::IsDirectory { .. })
        ));
    }

    #[test]
    fn writing_below_a_file_fails() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("a"), Bytes::new()).unwrap();
        let err = vfs.write(&p("a/b"), Bytes::new()).unwrap_err();
        assert!(matches!(err, VfsError::NotDirectory { path } if path == p("a")));
    }

    #[test]
    fn rename_moves_payload() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("k.hst1"), Bytes::from_static(b"older")).unwrap();
        vfs.write(&p("k.hst0"), Bytes::from_static(b"newer")).unwrap();
        vfs.rename(&p("k.hst1"), &p("k.hst0")).unwrap();
        assert_eq!(vfs.read(&p("k.hst0")).unwrap(), Bytes::from_static(b"older"));
        assert!(!vfs.exists(&p("k.hst1")));
    }

    #[test]
    fn rename_onto_itself_keeps_file() {
        let vfs = MemoryBacking::new();
        vfs.write(&p("same"), Bytes::from_static(b"v")).unwrap();
        vfs.rename(&p("same"), &p("same")).unwrap();
        assert!(vfs.exists(&p("same")));
    }

    #[test]
    fn files_lists_sorted_files() {
        let vfs = MemoryBacking::with_files([
            ("b.txt", Bytes::from_static(b"2")),
            ("a/x", Bytes::from_static(b"1")),
        ])
        .unwrap();
        let files: Vec<String> = vfs.files().iter().map(|f| f.to_string()).collect();
        assert_eq!(files, vec!["/a/x", "/b.txt"]);
        assert_eq!(vfs.total_bytes(), 2);
    }

    #[test]
    fn concurrent_writes_to_distinct_keys() {
        let vfs = Arc::new(MemoryBacking::new());
        std::thread::scope(|scope| {
            for i in 0..16 {
                let vfs = Arc::clone(&vfs);
                scope.spawn(move || {
                    let path = p(&format!("pkg/C{i}"));
                    vfs.write(&path, Bytes::from(vec![i as u8; 8])).unwrap();
                });
            }
        });
        assert_eq!(vfs.file_count(), 16);
    }
}
