//! The entry registry: which keys exist, of which kind, and which are dirty.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::key::EntryKind;

#[derive(Default)]
struct Sets {
    classes: BTreeSet<String>,
    resources: BTreeSet<String>,
    dirty: BTreeSet<String>,
}

impl Sets {
    fn kind_of(&self, key: &str) -> Option<EntryKind> {
        if self.classes.contains(key) {
            Some(EntryKind::Class)
        } else if self.resources.contains(key) {
            Some(EntryKind::Resource)
        } else {
            None
        }
    }
}

/// Class keys, resource keys and the dirty set.
///
/// A key is in at most one of the two kind sets. All operations are atomic
/// with respect to each other.
#[derive(Default)]
pub struct Registry {
    sets: RwLock<Sets>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `kind`.
    ///
    /// Returns `true` if the key was not registered before. Registering under
    /// the other kind fails with [`Error::KindConflict`].
    pub fn register(&self, kind: EntryKind, key: &str) -> Result<bool> {
        let mut sets = self.sets.write();
        match sets.kind_of(key) {
            Some(existing) if existing == kind => Ok(false),
            Some(existing) => Err(Error::KindConflict {
                key: key.to_string(),
                existing,
            }),
            None => {
                match kind {
                    EntryKind::Class => sets.classes.insert(key.to_string()),
                    EntryKind::Resource => sets.resources.insert(key.to_string()),
                };
                Ok(true)
            }
        }
    }

    pub fn register_class(&self, key: &str) -> Result<bool> {
        self.register(EntryKind::Class, key)
    }

    pub fn register_resource(&self, key: &str) -> Result<bool> {
        self.register(EntryKind::Resource, key)
    }

    /// Flag a registered key as changed since the last checkpoint.
    ///
    /// Returns `false` (and does nothing) for unknown keys.
    pub fn mark_dirty(&self, key: &str) -> bool {
        let mut sets = self.sets.write();
        if sets.kind_of(key).is_none() {
            return false;
        }
        sets.dirty.insert(key.to_string());
        true
    }

    /// Take the dirty set, leaving it empty.
    pub fn drain_dirty(&self) -> BTreeSet<String> {
        std::mem::take(&mut self.sets.write().dirty)
    }

    pub fn dirty_snapshot(&self) -> BTreeSet<String> {
        self.sets.read().dirty.clone()
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.sets.read().dirty.contains(key)
    }

    /// Unflag the given keys.
    pub fn clear_dirty<'a>(&self, keys: impl IntoIterator<Item = &'a String>) {
        let mut sets = self.sets.write();
        for key in keys {
            sets.dirty.remove(key);
        }
    }

    /// Remove a key from whichever set holds it, and from the dirty set.
    ///
    /// Returns the kind the key had.
    pub fn forget(&self, key: &str) -> Option<EntryKind> {
        let mut sets = self.sets.write();
        let kind = sets.kind_of(key)?;
        match kind {
            EntryKind::Class => sets.classes.remove(key),
            EntryKind::Resource => sets.resources.remove(key),
        };
        sets.dirty.remove(key);
        Some(kind)
    }

    pub fn kind_of(&self, key: &str) -> Option<EntryKind> {
        self.sets.read().kind_of(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.kind_of(key).is_some()
    }

    /// Sorted snapshot of class keys.
    pub fn class_keys(&self) -> Vec<String> {
        self.sets.read().classes.iter().cloned().collect()
    }

    /// Sorted snapshot of resource keys.
    pub fn resource_keys(&self) -> Vec<String> {
        self.sets.read().resources.iter().cloned().collect()
    }

    /// Sorted snapshot of the keys of one kind.
    pub fn keys(&self, kind: EntryKind) -> Vec<String> {
        match kind {
            EntryKind::Class => self.class_keys(),
            EntryKind::Resource => self.resource_keys(),
        }
    }

    /// Number of keys of one kind.
    pub fn count(&self, kind: EntryKind) -> usize {
        let sets = self.sets.read();
        match kind {
            EntryKind::Class => sets.classes.len(),
            EntryKind::Resource => sets.resources.len(),
        }
    }

    /// Total number of registered keys.
    pub fn len(&self) -> usize {
        let sets = self.sets.read();
        sets.classes.len() + sets.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
