//! Bounded per-key undo history, persisted in the backing.
//!
//! Snapshots of key `K` live at `K<suffix>0` .. `K<suffix>(N-1)` next to the
//! raw slot. Slot 0 is the most recently superseded version. Slot contents
//! survive cache eviction; only the per-key lengths are kept in memory.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use classfs_vfs::{SharedBacking, VfsError, VfsPath};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::key::key_path;
use crate::locks::{KeyGuard, KeyLocks};

pub struct History {
    backing: SharedBacking,
    locks: Arc<KeyLocks>,
    depth: usize,
    suffix: String,
    lengths: Mutex<HashMap<String, usize>>,
}

impl History {
    /// `depth` must be at least 1.
    pub fn new(
        backing: SharedBacking,
        locks: Arc<KeyLocks>,
        depth: usize,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            backing,
            locks,
            depth: depth.max(1),
            suffix: suffix.into(),
            lengths: Mutex::new(HashMap::new()),
        }
    }

    /// Maximum snapshots per key.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of snapshots held for `key`.
    pub fn length(&self, key: &str) -> usize {
        self.lengths.lock().get(key).copied().unwrap_or(0)
    }

    pub fn is_versioned(&self, key: &str) -> bool {
        self.length(key) > 0
    }

    /// Sorted keys with at least one snapshot.
    pub fn versioned_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lengths.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Read snapshot `index` without popping it.
    pub fn slot(&self, key: &str, index: usize) -> Result<Option<Bytes>> {
        let _guard = self.locks.lock(key);
        if index >= self.length(key) {
            return Ok(None);
        }
        let path = self.slot_path(key, index)?;
        match self.backing.read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() || e.is_interrupted() => Ok(None),
            Err(e) => Err(Error::io(format!("reading history slot {}", path), e)),
        }
    }

    /// Replace the raw slot of the guarded key with `new_bytes`, keeping the
    /// old bytes as the newest snapshot. Returns the new history length.
    pub(crate) fn checkpoint_guarded(
        &self,
        guard: &KeyGuard<'_>,
        new_bytes: Bytes,
    ) -> Result<usize> {
        let key = guard.key();
        let raw = key_path(key)?;
        let current = self.backing.read(&raw).map_err(|e| match e {
            VfsError::NotFound { .. } => Error::NotFound {
                key: key.to_string(),
            },
            e => Error::io(format!("reading {} for checkpoint", raw), e),
        })?;

        let length = self.length(key);
        for i in (1..=length.min(self.depth - 1)).rev() {
            let from = self.slot_path(key, i - 1)?;
            let to = self.slot_path(key, i)?;
            self.backing
                .copy(&from, &to)
                .map_err(|e| Error::io(format!("shifting history {} -> {}", from, to), e))?;
        }

        let slot0 = self.slot_path(key, 0)?;
        self.backing
            .write(&slot0, current)
            .map_err(|e| Error::io(format!("writing history slot {}", slot0), e))?;
        self.backing
            .write(&raw, new_bytes)
            .map_err(|e| Error::io(format!("writing {}", raw), e))?;

        let new_length = (length + 1).min(self.depth);
        self.lengths.lock().insert(key.to_string(), new_length);
        tracing::debug!(key, length = new_length, "history pushed");
        Ok(new_length)
    }

    /// Pop the newest snapshot back into the raw slot. Callers that cache
    /// decoded values must invalidate under the same guard.
    pub(crate) fn undo_guarded(&self, guard: &KeyGuard<'_>) -> Result<Option<Bytes>> {
        let key = guard.key();
        let length = self.length(key);
        if length == 0 {
            return Ok(None);
        }

        let slot0 = self.slot_path(key, 0)?;
        let restored = self
            .backing
            .read(&slot0)
            .map_err(|e| Error::io(format!("reading history slot {}", slot0), e))?;

        for i in 1..length {
            let from = self.slot_path(key, i)?;
            let to = self.slot_path(key, i - 1)?;
            self.backing
                .copy(&from, &to)
                .map_err(|e| Error::io(format!("shifting history {} -> {}", from, to), e))?;
        }
        let top = self.slot_path(key, length - 1)?;
        if let Err(e) = self.backing.delete(&top) {
            if !e.is_not_found() {
                return Err(Error::io(format!("deleting history slot {}", top), e));
            }
        }

        {
            let mut lengths = self.lengths.lock();
            if length == 1 {
                lengths.remove(key);
            } else {
                lengths.insert(key.to_string(), length - 1);
            }
        }

        let raw = key_path(key)?;
        self.backing
            .write(&raw, restored.clone())
            .map_err(|e| Error::io(format!("restoring {}", raw), e))?;
        tracing::debug!(key, length = length - 1, "history popped");
        Ok(Some(restored))
    }

    pub(crate) fn clear_guarded(&self, guard: &KeyGuard<'_>) {
        let key = guard.key();
        self.lengths.lock().remove(key);
        for i in 0..self.depth {
            let Ok(path) = self.slot_path(key, i) else {
                return;
            };
            match self.backing.delete(&path) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => tracing::warn!(%path, error = %e, "failed to delete history slot"),
            }
        }
    }

    fn slot_path(&self, key: &str, index: usize) -> Result<VfsPath> {
        Ok(key_path(key)?.with_suffix(&format!("{}{}", self.suffix, index)))
    }
}

#[cfg(test)]
impl History {
    pub(crate) fn checkpoint(&self, key: &str, new_bytes: Bytes) -> Result<usize> {
        let guard = self.locks.lock(key);
        self.checkpoint_guarded(&guard, new_bytes)
    }

    fn undo(&self, key: &str) -> Result<Option<Bytes>> {
        let guard = self.locks.lock(key);
        self.undo_guarded(&guard)
    }

    fn clear(&self, key: &str) {
        let guard = self.locks.lock(key);
        self.clear_guarded(&guard)
    }
}
