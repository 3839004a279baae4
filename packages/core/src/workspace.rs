//! The workspace: one ingested input and everything derived from it.

use std::collections::BTreeMap;
use std::io::{Seek, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use classfs_vfs::{MemoryBacking, SharedBacking};
use parking_lot::Mutex;

use crate::cache::ProxyMap;
use crate::codec::{RawCodec, UnitCodec};
use crate::config::{CommitPolicy, StoreConfig};
use crate::error::{Error, Result};
use crate::events::{EventBus, Notification, Subscriber, SubscriptionId, WorkspaceId};
use crate::export::{write_archive, EntryFailure, Export, ExportReport};
use crate::history::History;
use crate::ingest::{IngestReport, Ingestor, Source};
use crate::key::{binary_name, key_path, EntryKind};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::locks::KeyLocks;
use crate::registry::Registry;
use crate::runtime::{LoadEvent, LoadHook};

/// Result of a commit to a live runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReport {
    /// Internal names of the redefined classes.
    pub keys: Vec<String>,
    /// Whether the runtime accepted the batch.
    pub applied: bool,
}

struct Inner<C: UnitCodec> {
    id: WorkspaceId,
    source: Source,
    config: StoreConfig,
    backing: SharedBacking,
    registry: Arc<Registry>,
    locks: Arc<KeyLocks>,
    history: Arc<History>,
    classes: ProxyMap<C>,
    resources: ProxyMap<RawCodec>,
    lifecycle: Lifecycle,
    bus: Arc<EventBus>,
    subscription: Mutex<Option<SubscriptionId>>,
    hook: Mutex<Option<Arc<dyn LoadHook>>>,
    report: IngestReport,
}

impl<C: UnitCodec> Inner<C> {
    /// Leave the bus and the host runtime. Idempotent.
    fn detach(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.bus.unsubscribe(id);
        }
        let hook = self.hook.lock().take();
        if let (Some(hook), Some(runtime)) = (hook, self.source.runtime()) {
            runtime.remove_load_hook(&hook);
        }
    }
}

impl<C: UnitCodec> Drop for Inner<C> {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A handle to one ingested input.
///
/// Cloning the handle is cheap; all clones share state. There is no global
/// current workspace: pass handles explicitly, or let a
/// [`Session`](crate::Session) own the current one.
pub struct Workspace<C: UnitCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: UnitCodec> Clone for Workspace<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: UnitCodec> std::fmt::Debug for Workspace<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("state", &self.inner.lifecycle.state())
            .finish()
    }
}

impl<C: UnitCodec> Workspace<C> {
    /// Ingest `source` into a fresh in-memory backing.
    pub fn open(source: Source, codec: C, bus: Arc<EventBus>, config: StoreConfig) -> Result<Self> {
        Self::open_with_backing(source, codec, Arc::new(MemoryBacking::new()), bus, config)
    }

    /// Ingest `source` into `backing`, which should be empty.
    pub fn open_with_backing(
        source: Source,
        codec: C,
        backing: SharedBacking,
        bus: Arc<EventBus>,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(Registry::new());
        let locks = Arc::new(KeyLocks::new());
        let history = Arc::new(History::new(
            backing.clone(),
            locks.clone(),
            config.history_depth,
            config.history_suffix.clone(),
        ));

        let report = Ingestor {
            backing: backing.as_ref(),
            registry: &registry,
            codec: &codec,
            unit_suffix: &config.unit_suffix,
        }
        .ingest(&source)?;

        let classes = ProxyMap::new(
            EntryKind::Class,
            codec,
            backing.clone(),
            registry.clone(),
            history.clone(),
            locks.clone(),
        );
        let resources = ProxyMap::new(
            EntryKind::Resource,
            RawCodec,
            backing.clone(),
            registry.clone(),
            history.clone(),
            locks.clone(),
        );

        let inner = Arc::new(Inner {
            id: WorkspaceId::new(),
            source,
            config,
            backing,
            registry,
            locks,
            history,
            classes,
            resources,
            lifecycle: Lifecycle::new(),
            bus: bus.clone(),
            subscription: Mutex::new(None),
            hook: Mutex::new(None),
            report,
        });

        let retired = Arc::downgrade(&inner);
        inner.lifecycle.on_retired(move || {
            if let Some(inner) = retired.upgrade() {
                inner.detach();
                tracing::info!(workspace = %inner.id, "workspace retired");
            }
        });

        let listener = Arc::new(Listener {
            workspace: Arc::downgrade(&inner),
        });
        *inner.subscription.lock() = Some(bus.subscribe(listener));

        tracing::info!(workspace = %inner.id, source = ?inner.source, "workspace opened");
        Ok(Self { inner })
    }

    pub fn id(&self) -> WorkspaceId {
        self.inner.id
    }

    pub fn source(&self) -> &Source {
        &self.inner.source
    }

    pub fn is_live(&self) -> bool {
        self.inner.source.is_live()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// What ingestion stored, demoted and skipped.
    pub fn ingest_report(&self) -> &IngestReport {
        &self.inner.report
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    // --- queries ---

    /// Registered class keys, sorted.
    pub fn class_keys(&self) -> Result<Vec<String>> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.registry.class_keys())
    }

    /// Registered resource keys, sorted.
    pub fn resource_keys(&self) -> Result<Vec<String>> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.registry.resource_keys())
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.registry.contains(key))
    }

    /// Keys awaiting the next checkpoint or commit, sorted.
    pub fn dirty_keys(&self) -> Result<Vec<String>> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.registry.dirty_snapshot().into_iter().collect())
    }

    pub fn is_dirty(&self, key: &str) -> Result<bool> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.registry.is_dirty(key))
    }

    /// Whether `key` has at least one snapshot.
    pub fn is_versioned(&self, key: &str) -> Result<bool> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.history.is_versioned(key))
    }

    // --- entries ---

    pub fn class(&self, key: &str) -> Result<Option<C::Value>> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.classes.get(key)
    }

    pub fn resource(&self, key: &str) -> Result<Option<Bytes>> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.resources.get(key)
    }

    /// The raw slot bytes of a registered key, bypassing the cache.
    pub fn raw_bytes(&self, key: &str) -> Result<Option<Bytes>> {
        let _op = self.inner.lifecycle.enter()?;
        if !self.inner.registry.contains(key) {
            return Ok(None);
        }
        let _guard = self.inner.locks.lock(key);
        let path = key_path(key)?;
        match self.inner.backing.read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() || e.is_interrupted() => Ok(None),
            Err(e) => Err(Error::io(format!("reading {}", path), e)),
        }
    }

    pub fn put_class(&self, key: &str, value: C::Value) -> Result<()> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.classes.put(key, value)
    }

    pub fn put_resource(&self, key: &str, bytes: Bytes) -> Result<()> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.resources.put(key, bytes)
    }

    /// Replace the cached class value without writing it.
    ///
    /// The edit is marked dirty so the next checkpoint persists it.
    pub fn stage_class(&self, key: &str, value: C::Value) -> Result<()> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.classes.stage(key, value)?;
        self.inner.registry.mark_dirty(key);
        Ok(())
    }

    /// Edit a class in memory and mark it dirty.
    pub fn modify_class<F>(&self, key: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut C::Value),
    {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.classes.modify(key, edit)?;
        self.inner.registry.mark_dirty(key);
        Ok(())
    }

    pub fn remove_class(&self, key: &str) -> Result<Option<C::Value>> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.classes.remove(key)
    }

    pub fn remove_resource(&self, key: &str) -> Result<Option<Bytes>> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.resources.remove(key)
    }

    /// Flag a key for the next checkpoint. Returns `false` for unknown keys.
    pub fn mark_dirty(&self, key: &str) -> Result<bool> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.registry.mark_dirty(key))
    }

    // --- history ---

    /// Snapshot every dirty entry.
    ///
    /// The dirty set is drained atomically. Each drained key that is still
    /// registered gets its current value encoded into the raw slot, with the
    /// previous raw bytes pushed onto its history. A failure on one key is
    /// logged and does not stop the others. Returns the keys checkpointed.
    pub fn checkpoint(&self) -> Result<Vec<String>> {
        let _op = self.inner.lifecycle.enter()?;
        let inner = &self.inner;
        let drained = inner.registry.drain_dirty();

        let mut saved = Vec::with_capacity(drained.len());
        for key in drained {
            let guard = inner.locks.lock(&key);
            let encoded = match inner.registry.kind_of(&key) {
                Some(EntryKind::Class) => inner.classes.encode_guarded(&guard),
                Some(EntryKind::Resource) => inner.resources.encode_guarded(&guard),
                None => continue,
            };
            let result = encoded.and_then(|bytes| match bytes {
                Some(bytes) => inner.history.checkpoint_guarded(&guard, bytes).map(Some),
                None => Ok(None),
            });
            match result {
                Ok(Some(_)) => saved.push(key),
                Ok(None) => tracing::warn!(key = %key, "dirty entry has no data to save"),
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to save entry"),
            }
        }

        tracing::info!(workspace = %inner.id, count = saved.len(), "save state created");
        inner.bus.publish(&Notification::CheckpointCompleted {
            workspace: inner.id,
            keys: saved.clone(),
        });
        Ok(saved)
    }

    /// Revert `key` to its newest snapshot.
    ///
    /// Returns the restored bytes, or `None` if there is nothing to revert.
    pub fn undo(&self, key: &str) -> Result<Option<Bytes>> {
        let _op = self.inner.lifecycle.enter()?;
        let inner = &self.inner;
        let guard = inner.locks.lock(key);
        let restored = inner.history.undo_guarded(&guard)?;
        if restored.is_some() {
            inner.classes.invalidate_guarded(&guard);
            inner.resources.invalidate_guarded(&guard);
            tracing::info!(key, remaining = inner.history.length(key), "reverted");
        }
        Ok(restored)
    }

    pub fn history_len(&self, key: &str) -> Result<usize> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.inner.history.length(key))
    }

    /// Read snapshot `index` of `key` (0 is the newest) without reverting.
    pub fn history_slot(&self, key: &str, index: usize) -> Result<Option<Bytes>> {
        let _op = self.inner.lifecycle.enter()?;
        self.inner.history.slot(key, index)
    }

    // --- reconstruction ---

    /// Assemble the output entries without writing anything.
    pub fn export_entries(&self) -> Result<Export> {
        let _op = self.inner.lifecycle.enter()?;
        Ok(self.assemble(None))
    }

    /// Write the output archive to `dest`.
    pub fn export(&self, dest: impl AsRef<Path>) -> Result<ExportReport> {
        let _op = self.inner.lifecycle.enter()?;
        let dest = dest.as_ref();
        let Export { entries, mut report } = self.assemble(Some(dest));

        let file = std::fs::File::create(dest).map_err(|source| Error::File {
            path: dest.to_path_buf(),
            source,
        })?;
        let file = write_archive(file, &entries)?;
        file.sync_all().map_err(|source| Error::File {
            path: dest.to_path_buf(),
            source,
        })?;

        report.written = entries.len();
        tracing::info!(
            workspace = %self.inner.id,
            dest = %dest.display(),
            entries = report.written,
            failures = report.failures.len(),
            "exported"
        );
        Ok(report)
    }

    /// Write the output archive to `writer`, returning it with the report.
    pub fn export_to<W: Write + Seek>(&self, writer: W) -> Result<(W, ExportReport)> {
        let _op = self.inner.lifecycle.enter()?;
        let Export { entries, mut report } = self.assemble(None);
        let writer = write_archive(writer, &entries)?;
        report.written = entries.len();
        tracing::info!(workspace = %self.inner.id, entries = report.written, "exported");
        Ok((writer, report))
    }

    fn assemble(&self, dest: Option<&Path>) -> Export {
        let inner = &self.inner;
        let mut export = Export::default();

        for key in inner.registry.class_keys() {
            let guard = inner.locks.lock(&key);
            let changed = inner.registry.is_dirty(&key) || inner.history.is_versioned(&key);
            let bytes = if changed {
                inner.classes.encode_guarded(&guard)
            } else {
                self.read_raw(&key)
            };
            drop(guard);
            match bytes {
                Ok(Some(bytes)) => {
                    if changed {
                        export.report.reencoded.push(key.clone());
                    }
                    let name = format!("{}{}", key, inner.config.unit_suffix);
                    export.entries.insert(name, bytes);
                }
                Ok(None) => export.report.failures.push(EntryFailure {
                    key,
                    reason: "no data".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "entry left out of export");
                    export.report.failures.push(EntryFailure {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        for key in inner.registry.resource_keys() {
            let guard = inner.locks.lock(&key);
            let bytes = self.read_raw(&key);
            drop(guard);
            match bytes {
                Ok(Some(bytes)) => {
                    export.entries.insert(key, bytes);
                }
                Ok(None) => export.report.failures.push(EntryFailure {
                    key,
                    reason: "no data".to_string(),
                }),
                Err(e) => export.report.failures.push(EntryFailure {
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        export.report.injection_failures =
            inner.bus.inject_exports(inner.id, dest, &mut export.entries);
        export.report.written = export.entries.len();
        export
    }

    fn read_raw(&self, key: &str) -> Result<Option<Bytes>> {
        let path = key_path(key)?;
        match self.inner.backing.read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() || e.is_interrupted() => Ok(None),
            Err(e) => Err(Error::io(format!("reading {}", path), e)),
        }
    }

    /// Redefine every dirty class in the live runtime as one batch.
    ///
    /// The dirty set is then cleared according to the configured
    /// [`CommitPolicy`]. Fails with [`Error::NotLive`] for file inputs and
    /// [`Error::Redefinition`] if the runtime rejects the batch.
    pub fn commit_to_runtime(&self) -> Result<CommitReport> {
        let _op = self.inner.lifecycle.enter()?;
        let inner = &self.inner;
        let runtime = inner.source.runtime().ok_or(Error::NotLive)?;

        let dirty = inner.registry.dirty_snapshot();
        let mut keys = Vec::new();
        let mut targets = BTreeMap::new();
        for key in &dirty {
            if inner.registry.kind_of(key) != Some(EntryKind::Class) {
                continue;
            }
            let guard = inner.locks.lock(key);
            match inner.classes.encode_guarded(&guard) {
                Ok(Some(bytes)) => {
                    targets.insert(binary_name(key), bytes);
                    keys.push(key.clone());
                }
                Ok(None) => tracing::warn!(key = %key, "dirty class has no data to commit"),
                Err(e) => tracing::warn!(key = %key, error = %e, "dirty class left out of commit"),
            }
        }
        tracing::info!(workspace = %inner.id, modified = targets.len(), "redefining classes");

        inner.bus.adjust_commit(inner.id, &mut targets);
        let result = if targets.is_empty() {
            Ok(())
        } else {
            runtime.redefine(&targets)
        };
        let applied = result.is_ok();

        match (inner.config.commit_policy, applied) {
            (CommitPolicy::ClearAlways, _) | (CommitPolicy::KeepDirtyOnFailure, true) => {
                inner.registry.clear_dirty(&dirty)
            }
            (CommitPolicy::KeepDirtyOnFailure, false) => {}
        }

        inner.bus.publish(&Notification::CommitCompleted {
            workspace: inner.id,
            keys: keys.clone(),
            applied,
        });

        match result {
            Ok(()) => {
                tracing::info!(workspace = %inner.id, "redefinition complete");
                Ok(CommitReport { keys, applied })
            }
            Err(e) => {
                tracing::error!(workspace = %inner.id, error = %e, "redefinition failed");
                Err(Error::Redefinition(e))
            }
        }
    }

    // --- live updates ---

    /// Register a load hook with the live runtime so units loaded or
    /// redefined from now on are stored. Installing twice is a no-op.
    ///
    /// The hook is removed again when the workspace retires or is dropped.
    pub fn install_load_hook(&self) -> Result<()> {
        let _op = self.inner.lifecycle.enter()?;
        let runtime = self.inner.source.runtime().ok_or(Error::NotLive)?;
        let mut installed = self.inner.hook.lock();
        if installed.is_some() {
            return Ok(());
        }
        let hook: Arc<dyn LoadHook> = Arc::new(Hook {
            workspace: Arc::downgrade(&self.inner),
        });
        runtime.install_load_hook(hook.clone());
        *installed = Some(hook);
        tracing::debug!(workspace = %self.inner.id, "load hook installed");
        Ok(())
    }

    fn observe_load(&self, event: &LoadEvent) -> Result<()> {
        let _op = self.inner.lifecycle.enter()?;
        let inner = &self.inner;
        let (Some(name), Some(bytes)) = (&event.unit_name, &event.bytes) else {
            return Ok(());
        };
        let key = inner.classes.codec().normalize_key(name);

        let is_new = {
            let guard = inner.locks.lock(&key);
            let is_new = inner.registry.register_class(&key)?;
            if let Err(e) = inner.classes.write_raw_guarded(&guard, bytes.clone()) {
                if is_new {
                    inner.registry.forget(&key);
                }
                return Err(e);
            }
            is_new
        };

        tracing::debug!(key = %key, is_new, redefining = event.redefining, "unit observed");
        inner.bus.publish(&Notification::ClassObserved {
            workspace: inner.id,
            key,
            is_new,
        });
        Ok(())
    }

    // --- notifications and teardown ---

    /// Apply a notification addressed to workspaces.
    pub fn handle(&self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::InputSelected { workspace } if *workspace != self.inner.id => {
                if self.inner.lifecycle.begin_retire() {
                    tracing::info!(workspace = %self.inner.id, "superseded by new input");
                }
                Ok(())
            }
            Notification::CheckpointRequested => self.checkpoint().map(|_| ()),
            Notification::EntryDirty { key } => self.mark_dirty(key).map(|_| ()),
            Notification::ResourceUpdated { key, bytes: None } => {
                self.remove_resource(key).map(|_| ())
            }
            Notification::ResourceUpdated {
                key,
                bytes: Some(bytes),
            } => self.update_resource(key, bytes.clone()),
            _ => Ok(()),
        }
    }

    fn update_resource(&self, key: &str, bytes: Bytes) -> Result<()> {
        let _op = self.inner.lifecycle.enter()?;
        let inner = &self.inner;
        let guard = inner.locks.lock(key);
        inner.registry.register_resource(key)?;
        inner.resources.write_raw_guarded(&guard, bytes)
    }

    /// Stop accepting operations and wait for in-flight ones. Idempotent.
    ///
    /// Once the last operation exits the workspace leaves the bus and removes
    /// its load hook. Must not be called from inside an operation or
    /// notification delivery of this workspace.
    pub fn retire(&self) {
        self.inner.lifecycle.begin_retire();
        self.inner.lifecycle.wait_retired();
    }
}

/// Bus subscription of one workspace.
struct Listener<C: UnitCodec> {
    workspace: Weak<Inner<C>>,
}

impl<C: UnitCodec> Subscriber for Listener<C> {
    fn on_notification(&self, notification: &Notification) {
        let Some(inner) = self.workspace.upgrade() else {
            return;
        };
        let workspace = Workspace { inner };
        match workspace.handle(notification) {
            Ok(()) => {}
            Err(Error::Retired) => {
                tracing::debug!(workspace = %workspace.id(), ?notification, "ignored after retirement")
            }
            Err(e) => {
                tracing::warn!(workspace = %workspace.id(), error = %e, ?notification, "notification failed")
            }
        }
    }
}

/// Load hook of one live workspace. Inert once the workspace is dropped or
/// retired; never unwinds into the host.
struct Hook<C: UnitCodec> {
    workspace: Weak<Inner<C>>,
}

impl<C: UnitCodec> LoadHook for Hook<C> {
    fn on_load(&self, event: &LoadEvent) -> Option<Bytes> {
        let inner = self.workspace.upgrade()?;
        let workspace = Workspace { inner };
        match catch_unwind(AssertUnwindSafe(|| workspace.observe_load(event))) {
            Ok(Ok(())) | Ok(Err(Error::Retired)) => {}
            Ok(Err(e)) => tracing::warn!(
                unit = ?event.unit_name,
                error = %e,
                "failed to store loaded unit"
            ),
            Err(_) => tracing::warn!(unit = ?event.unit_name, "load hook panicked"),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ClassFileCodec;
    use crate::testing::MockRuntime;
    use classfs_classfile::ClassFile;
    use classfs_vfs::{Backing, VfsError, VfsPath};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn synthetic(name: &str) -> ClassFile {
        ClassFile::synthetic(name, "java/lang/Object").unwrap()
    }

    fn live(runtime: &Arc<MockRuntime>) -> Workspace<ClassFileCodec> {
        Workspace::open(
            Source::Live(runtime.clone()),
            ClassFileCodec,
            Arc::new(EventBus::new()),
            StoreConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn live_ingestion_normalizes_binary_names() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.add_unit("pkg.A", Some(synthetic("pkg/A").to_bytes()));
        runtime.add_unit("pkg.Hidden", None);

        let ws = live(&runtime);
        assert_eq!(ws.class_keys().unwrap(), vec!["pkg/A".to_string()]);
        assert_eq!(ws.ingest_report().skipped.len(), 1);
        assert_eq!(ws.class("pkg/A").unwrap().unwrap().name().unwrap(), "pkg/A");
    }

    #[test]
    fn enumeration_failure_is_host_error() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.fail_enumeration(true);
        let err = Workspace::open(
            Source::Live(runtime),
            ClassFileCodec,
            Arc::new(EventBus::new()),
            StoreConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Host(_)));
    }

    #[test]
    fn invalid_config_is_rejected_at_open() {
        let runtime = Arc::new(MockRuntime::new());
        let config = StoreConfig {
            history_depth: 0,
            ..StoreConfig::default()
        };
        let err = Workspace::open(
            Source::Live(runtime),
            ClassFileCodec,
            Arc::new(EventBus::new()),
            config,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn hook_ignores_incomplete_events() {
        let runtime = Arc::new(MockRuntime::new());
        let ws = live(&runtime);
        ws.install_load_hook().unwrap();

        let hook_result = runtime.fire(&LoadEvent {
            unit_name: Some("pkg/NoBytes".into()),
            ..LoadEvent::default()
        });
        assert_eq!(hook_result, vec![None]);
        assert!(ws.class_keys().unwrap().is_empty());
    }

    #[test]
    fn hook_write_invalidates_cache() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.add_unit("pkg.A", Some(synthetic("pkg/A").to_bytes()));
        let ws = live(&runtime);
        ws.install_load_hook().unwrap();
        ws.modify_class("pkg/A", |c| c.set_name("pkg/Staged").unwrap())
            .unwrap();

        let mut redefined = synthetic("pkg/A");
        redefined.major_version = 61;
        runtime.load("pkg/A", redefined.to_bytes());

        let current = ws.class("pkg/A").unwrap().unwrap();
        assert_eq!(current.major_version, 61);
        assert_eq!(current.name().unwrap(), "pkg/A");
    }

    #[test]
    fn commit_on_file_input_is_not_live() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.class");
        std::fs::write(&path, synthetic("pkg/A").to_bytes()).unwrap();
        let ws = Workspace::open(
            Source::file(&path),
            ClassFileCodec,
            Arc::new(EventBus::new()),
            StoreConfig::default(),
        )
        .unwrap();
        assert!(matches!(ws.commit_to_runtime(), Err(Error::NotLive)));
        assert!(matches!(ws.install_load_hook(), Err(Error::NotLive)));
    }

    #[test]
    fn resource_updates_rewrite_and_remove() {
        let runtime = Arc::new(MockRuntime::new());
        let ws = live(&runtime);

        ws.handle(&Notification::ResourceUpdated {
            key: "conf/app.properties".into(),
            bytes: Some(Bytes::from_static(b"a=1")),
        })
        .unwrap();
        assert_eq!(ws.resource("conf/app.properties").unwrap().unwrap(), "a=1");

        ws.handle(&Notification::ResourceUpdated {
            key: "conf/app.properties".into(),
            bytes: Some(Bytes::from_static(b"a=2")),
        })
        .unwrap();
        assert_eq!(ws.resource("conf/app.properties").unwrap().unwrap(), "a=2");

        ws.handle(&Notification::ResourceUpdated {
            key: "conf/app.properties".into(),
            bytes: None,
        })
        .unwrap();
        assert_eq!(ws.resource("conf/app.properties").unwrap(), None);
        assert!(!ws.contains("conf/app.properties").unwrap());
    }

    #[test]
    fn resource_update_on_class_key_conflicts() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.add_unit("pkg.A", Some(synthetic("pkg/A").to_bytes()));
        let ws = live(&runtime);
        let err = ws
            .handle(&Notification::ResourceUpdated {
                key: "pkg/A".into(),
                bytes: Some(Bytes::new()),
            })
            .unwrap_err();
        assert!(matches!(err, Error::KindConflict { .. }));
    }

    #[test]
    fn retire_is_idempotent() {
        let runtime = Arc::new(MockRuntime::new());
        let ws = live(&runtime);
        ws.retire();
        ws.retire();
        assert_eq!(ws.state(), LifecycleState::Retired);
        assert!(matches!(ws.class("pkg/A"), Err(Error::Retired)));
    }

    #[test]
    fn queries_fail_after_retirement() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.add_unit("pkg.A", Some(synthetic("pkg/A").to_bytes()));
        let ws = live(&runtime);
        ws.retire();

        assert!(matches!(ws.class_keys(), Err(Error::Retired)));
        assert!(matches!(ws.resource_keys(), Err(Error::Retired)));
        assert!(matches!(ws.contains("pkg/A"), Err(Error::Retired)));
        assert!(matches!(ws.dirty_keys(), Err(Error::Retired)));
        assert!(matches!(ws.history_len("pkg/A"), Err(Error::Retired)));
        assert!(matches!(ws.is_versioned("pkg/A"), Err(Error::Retired)));
    }

    #[test]
    fn undo_refreshes_the_cached_value() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.add_unit("pkg.A", Some(synthetic("pkg/A").to_bytes()));
        let ws = live(&runtime);

        ws.modify_class("pkg/A", |c| c.major_version = 65).unwrap();
        assert_eq!(ws.dirty_keys().unwrap(), vec!["pkg/A".to_string()]);
        assert_eq!(ws.checkpoint().unwrap(), vec!["pkg/A".to_string()]);
        assert!(ws.is_versioned("pkg/A").unwrap());
        assert_eq!(ws.class("pkg/A").unwrap().unwrap().major_version, 65);

        ws.undo("pkg/A").unwrap().unwrap();
        assert_eq!(ws.history_len("pkg/A").unwrap(), 0);
        assert_eq!(
            ws.class("pkg/A").unwrap().unwrap().major_version,
            synthetic("pkg/A").major_version
        );
    }

    #[test]
    fn superseded_workspace_settles_without_a_session() {
        let runtime = Arc::new(MockRuntime::new());
        let bus = Arc::new(EventBus::new());
        let ws = Workspace::open(
            Source::Live(runtime.clone()),
            ClassFileCodec,
            bus.clone(),
            StoreConfig::default(),
        )
        .unwrap();
        ws.install_load_hook().unwrap();
        assert_eq!(bus.len(), 1);
        assert_eq!(runtime.hook_count(), 1);

        bus.publish(&Notification::InputSelected {
            workspace: WorkspaceId::new(),
        });
        assert_eq!(ws.state(), LifecycleState::Retired);
        assert!(bus.is_empty());
        assert_eq!(runtime.hook_count(), 0);
        ws.retire();
    }

    #[test]
    fn dropped_workspaces_leave_the_bus_and_host() {
        let runtime = Arc::new(MockRuntime::new());
        let bus = Arc::new(EventBus::new());
        for _ in 0..5 {
            let ws = Workspace::open(
                Source::Live(runtime.clone()),
                ClassFileCodec,
                bus.clone(),
                StoreConfig::default(),
            )
            .unwrap();
            ws.install_load_hook().unwrap();
            ws.install_load_hook().unwrap();
            assert_eq!(bus.len(), 1);
            assert_eq!(runtime.hook_count(), 1);
        }
        assert!(bus.is_empty());
        assert_eq!(runtime.hook_count(), 0);
    }

    /// A backing whose reads can be made to report interruption.
    struct Interruptible {
        data: MemoryBacking,
        interrupted: AtomicBool,
    }

    impl Backing for Interruptible {
        fn read(&self, path: &VfsPath) -> classfs_vfs::Result<Bytes> {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(VfsError::Interrupted { path: path.clone() });
            }
            self.data.read(path)
        }

        fn write(&self, path: &VfsPath, data: Bytes) -> classfs_vfs::Result<()> {
            self.data.write(path, data)
        }

        fn delete(&self, path: &VfsPath) -> classfs_vfs::Result<()> {
            self.data.delete(path)
        }

        fn exists(&self, path: &VfsPath) -> bool {
            self.data.exists(path)
        }

        fn files(&self) -> Vec<VfsPath> {
            self.data.files()
        }
    }

    #[test]
    fn interrupted_reads_are_absent() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.add_unit("pkg.A", Some(synthetic("pkg/A").to_bytes()));
        let backing = Arc::new(Interruptible {
            data: MemoryBacking::new(),
            interrupted: AtomicBool::new(false),
        });
        let ws = Workspace::open_with_backing(
            Source::Live(runtime),
            ClassFileCodec,
            backing.clone(),
            Arc::new(EventBus::new()),
            StoreConfig::default(),
        )
        .unwrap();
        ws.modify_class("pkg/A", |c| c.major_version = 65).unwrap();
        ws.checkpoint().unwrap();
        ws.modify_class("pkg/A", |c| c.major_version = 66).unwrap();
        ws.checkpoint().unwrap();
        // Leaves one snapshot and nothing cached.
        ws.undo("pkg/A").unwrap();
        assert_eq!(ws.history_len("pkg/A").unwrap(), 1);

        backing.interrupted.store(true, Ordering::SeqCst);
        assert_eq!(ws.class("pkg/A").unwrap(), None);
        assert_eq!(ws.raw_bytes("pkg/A").unwrap(), None);
        assert_eq!(ws.history_slot("pkg/A", 0).unwrap(), None);
    }
}
