//! The proxy map: a decode cache in front of the raw slots of one kind.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use classfs_vfs::SharedBacking;
use parking_lot::RwLock;

use crate::codec::EntryCodec;
use crate::error::{Error, Result};
use crate::history::History;
use crate::key::{key_path, EntryKind};
use crate::locks::{KeyGuard, KeyLocks};
use crate::registry::Registry;

/// Lazily decoded view over the raw slots of one entry kind.
///
/// Reads go through the cache and decode at most once per raw-slot version.
/// Every raw-slot mutation evicts the cached value under the key's lock, so a
/// reader never sees a value decoded from superseded bytes.
pub struct ProxyMap<C: EntryCodec> {
    kind: EntryKind,
    codec: C,
    backing: SharedBacking,
    registry: Arc<Registry>,
    history: Arc<History>,
    locks: Arc<KeyLocks>,
    values: RwLock<HashMap<String, C::Value>>,
}

impl<C: EntryCodec> ProxyMap<C> {
    pub fn new(
        kind: EntryKind,
        codec: C,
        backing: SharedBacking,
        registry: Arc<Registry>,
        history: Arc<History>,
        locks: Arc<KeyLocks>,
    ) -> Self {
        Self {
            kind,
            codec,
            backing,
            registry,
            history,
            locks,
            values: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The decoded value of `key`.
    ///
    /// `Ok(None)` if the key is not registered under this kind, has no raw
    /// slot, or the read was interrupted.
    pub fn get(&self, key: &str) -> Result<Option<C::Value>> {
        let guard = self.locks.lock(key);
        self.get_guarded(&guard)
    }

    /// Register `key` and write `value` through to its raw slot.
    ///
    /// Does not mark the key dirty or touch its history.
    pub fn put(&self, key: &str, value: C::Value) -> Result<()> {
        let guard = self.locks.lock(key);
        self.registry.register(self.kind, key)?;
        self.write_raw_guarded(&guard, self.codec.encode(&value))
    }

    /// Replace the cached value without touching the raw slot.
    ///
    /// The staged value becomes durable at the next checkpoint and is
    /// discarded by any raw-slot write before then.
    pub fn stage(&self, key: &str, value: C::Value) -> Result<()> {
        let _guard = self.locks.lock(key);
        if !self.contains(key) {
            return Err(Error::NotFound {
                key: key.to_string(),
            });
        }
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Stage an edit of the current value.
    pub fn modify<F>(&self, key: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut C::Value),
    {
        let guard = self.locks.lock(key);
        let mut value = self.get_guarded(&guard)?.ok_or_else(|| Error::NotFound {
            key: key.to_string(),
        })?;
        edit(&mut value);
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Delete `key`: cache entry, raw slot, registration and history.
    ///
    /// Returns the prior value if it could be resolved. A failed delete of
    /// the raw slot is logged and tolerated.
    pub fn remove(&self, key: &str) -> Result<Option<C::Value>> {
        let guard = self.locks.lock(key);
        if !self.contains(key) {
            return Ok(None);
        }
        let prior = match self.get_guarded(&guard) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key, error = %e, "prior value unavailable on remove");
                None
            }
        };

        self.values.write().remove(key);
        let path = key_path(key)?;
        if let Err(e) = self.backing.delete(&path) {
            tracing::warn!(key, error = %e, "failed to delete raw slot");
        }
        self.registry.forget(key);
        self.history.clear_guarded(&guard);
        Ok(prior)
    }

    /// Drop the cached value of `key`, if any.
    pub fn invalidate(&self, key: &str) {
        self.values.write().remove(key);
    }

    /// Whether `key` is registered under this map's kind.
    pub fn contains(&self, key: &str) -> bool {
        self.registry.kind_of(key) == Some(self.kind)
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Sorted keys of this kind.
    pub fn keys(&self) -> Vec<String> {
        self.registry.keys(self.kind)
    }

    pub fn len(&self) -> usize {
        self.registry.count(self.kind)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_guarded(&self, guard: &KeyGuard<'_>) -> Result<Option<C::Value>> {
        let key = guard.key();
        if !self.contains(key) {
            return Ok(None);
        }
        if let Some(value) = self.values.read().get(key) {
            return Ok(Some(value.clone()));
        }

        let path = key_path(key)?;
        let bytes = match self.backing.read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() || e.is_interrupted() => return Ok(None),
            Err(e) => return Err(Error::io(format!("reading {}", path), e)),
        };
        let value = self.codec.decode(&bytes).map_err(|e| Error::Malformed {
            key: key.to_string(),
            source: Box::new(e),
        })?;
        self.values.write().insert(key.to_string(), value.clone());
        Ok(Some(value))
    }

    /// Encode the current (possibly staged) value.
    pub(crate) fn encode_guarded(&self, guard: &KeyGuard<'_>) -> Result<Option<Bytes>> {
        Ok(self
            .get_guarded(guard)?
            .map(|value| self.codec.encode(&value)))
    }

    /// Overwrite the raw slot and evict the cached value.
    pub(crate) fn write_raw_guarded(&self, guard: &KeyGuard<'_>, bytes: Bytes) -> Result<()> {
        let key = guard.key();
        let path = key_path(key)?;
        self.values.write().remove(key);
        self.backing
            .write(&path, bytes)
            .map_err(|e| Error::io(format!("writing {}", path), e))
    }

    pub(crate) fn invalidate_guarded(&self, guard: &KeyGuard<'_>) {
        self.values.write().remove(guard.key());
    }
}
