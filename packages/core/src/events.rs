//! In-process notifications between workspaces and collaborators.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::BoxError;

/// Identifies one workspace for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceId(Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages carried by the [`EventBus`].
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A new input became current; every other workspace should retire.
    InputSelected { workspace: WorkspaceId },
    /// Snapshot all dirty entries.
    CheckpointRequested,
    /// An entry was edited elsewhere.
    EntryDirty { key: String },
    /// A resource was changed elsewhere; `None` removes it.
    ResourceUpdated { key: String, bytes: Option<Bytes> },

    CheckpointCompleted {
        workspace: WorkspaceId,
        keys: Vec<String>,
    },
    CommitCompleted {
        workspace: WorkspaceId,
        keys: Vec<String>,
        applied: bool,
    },
    /// A live load hook stored a unit.
    ClassObserved {
        workspace: WorkspaceId,
        key: String,
        is_new: bool,
    },
}

/// A listener on the bus. Every method has a no-op default.
pub trait Subscriber: Send + Sync {
    fn on_notification(&self, _notification: &Notification) {}

    /// Add or replace entries of an export before it is written. `dest` is
    /// `None` when the export is not going to a file.
    fn on_export(
        &self,
        _workspace: WorkspaceId,
        _dest: Option<&Path>,
        _entries: &mut BTreeMap<String, Bytes>,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    /// Adjust the batch sent to the runtime. Keys are binary names.
    fn on_commit(&self, _workspace: WorkspaceId, _targets: &mut BTreeMap<String, Bytes>) {}
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Publish/subscribe within one process.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn Subscriber>)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver to every current subscriber, in subscription order.
    ///
    /// Subscribers are snapshotted first, so they may subscribe, unsubscribe
    /// or publish from inside a delivery.
    pub fn publish(&self, notification: &Notification) {
        for subscriber in self.snapshot() {
            subscriber.on_notification(notification);
        }
    }

    /// Run every subscriber's export injection. Returns the failures.
    pub(crate) fn inject_exports(
        &self,
        workspace: WorkspaceId,
        dest: Option<&Path>,
        entries: &mut BTreeMap<String, Bytes>,
    ) -> Vec<String> {
        let mut failures = Vec::new();
        for subscriber in self.snapshot() {
            if let Err(e) = subscriber.on_export(workspace, dest, entries) {
                tracing::warn!(%workspace, error = %e, "export injection failed");
                failures.push(e.to_string());
            }
        }
        failures
    }

    pub(crate) fn adjust_commit(
        &self,
        workspace: WorkspaceId,
        targets: &mut BTreeMap<String, Bytes>,
    ) {
        for subscriber in self.snapshot() {
            subscriber.on_commit(workspace, targets);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers
            .read()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }
}
