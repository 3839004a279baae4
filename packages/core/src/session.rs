//! Ownership of the current workspace.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::UnitCodec;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::events::{EventBus, Notification};
use crate::ingest::Source;
use crate::workspace::Workspace;

/// Holds the current workspace and replaces it when a new input is opened.
///
/// Opening a new input retires the previous workspace (waiting for its
/// in-flight operations) before announcing the new one on the bus.
pub struct Session<C: UnitCodec + Clone> {
    codec: C,
    config: StoreConfig,
    bus: Arc<EventBus>,
    current: RwLock<Option<Workspace<C>>>,
}

impl<C: UnitCodec + Clone> Session<C> {
    pub fn new(codec: C, config: StoreConfig) -> Self {
        Self::with_bus(codec, config, Arc::new(EventBus::new()))
    }

    pub fn with_bus(codec: C, config: StoreConfig, bus: Arc<EventBus>) -> Self {
        Self {
            codec,
            config,
            bus,
            current: RwLock::new(None),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The active workspace, if any.
    pub fn current(&self) -> Option<Workspace<C>> {
        self.current.read().clone()
    }

    /// Ingest `source` and make it current.
    ///
    /// If ingestion fails the previous workspace stays current.
    pub fn open(&self, source: Source) -> Result<Workspace<C>> {
        let workspace = Workspace::open(
            source,
            self.codec.clone(),
            self.bus.clone(),
            self.config.clone(),
        )?;

        let previous = self.current.write().replace(workspace.clone());
        if let Some(previous) = previous {
            previous.retire();
        }

        self.bus.publish(&Notification::InputSelected {
            workspace: workspace.id(),
        });
        Ok(workspace)
    }

    /// Retire the current workspace, leaving none.
    pub fn close(&self) {
        let previous = self.current.write().take();
        if let Some(previous) = previous {
            previous.retire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ClassFileCodec;
    use crate::lifecycle::LifecycleState;
    use crate::testing::MockRuntime;

    #[test]
    fn open_replaces_and_retires() {
        let session = Session::new(ClassFileCodec, StoreConfig::default());
        assert!(session.current().is_none());

        let first = session
            .open(Source::Live(Arc::new(MockRuntime::new())))
            .unwrap();
        assert_eq!(session.bus().len(), 1);

        let second = session
            .open(Source::Live(Arc::new(MockRuntime::new())))
            .unwrap();
        assert_eq!(first.state(), LifecycleState::Retired);
        assert_eq!(second.state(), LifecycleState::Active);
        assert_eq!(session.current().unwrap().id(), second.id());
        assert_eq!(session.bus().len(), 1);
    }

    #[test]
    fn failed_open_keeps_current() {
        let session = Session::new(ClassFileCodec, StoreConfig::default());
        let first = session
            .open(Source::Live(Arc::new(MockRuntime::new())))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(session.open(Source::file(dir.path().join("missing.jar"))).is_err());
        assert_eq!(session.current().unwrap().id(), first.id());
        assert_eq!(first.state(), LifecycleState::Active);
    }

    #[test]
    fn close_retires_current() {
        let session = Session::new(ClassFileCodec, StoreConfig::default());
        let ws = session
            .open(Source::Live(Arc::new(MockRuntime::new())))
            .unwrap();
        session.close();
        assert!(session.current().is_none());
        assert_eq!(ws.state(), LifecycleState::Retired);
        assert!(session.bus().is_empty());
    }
}
