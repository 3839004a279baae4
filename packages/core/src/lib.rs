//! classfs core: a versioned store of class files and resources.
//!
//! A [`Workspace`] ingests one input, either a file (a single compiled unit
//! or a ZIP archive) or a live [`HostRuntime`], into a [`Backing`]. On top of
//! the raw bytes it keeps:
//!
//! - a [`Registry`] of class keys, resource keys and dirty keys,
//! - a [`ProxyMap`] per kind that decodes lazily through an [`EntryCodec`]
//!   and caches the result until the raw slot changes,
//! - a bounded, backing-persisted [`History`] per key for checkpoint and
//!   undo,
//! - reconstruction: export to an archive that copies untouched entries
//!   verbatim, or a batch redefinition in the live runtime.
//!
//! Workspaces talk to collaborators through an [`EventBus`]. A [`Session`]
//! owns the current workspace and retires the previous one when a new
//! input is opened.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use classfs_classfile::ClassFile;
//! use classfs_core::{ClassFileCodec, EventBus, Source, StoreConfig, Workspace};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("A.class");
//! let class = ClassFile::synthetic("pkg/A", "java/lang/Object").unwrap();
//! std::fs::write(&path, class.to_bytes()).unwrap();
//!
//! let ws = Workspace::open(
//!     Source::file(&path),
//!     ClassFileCodec,
//!     Arc::new(EventBus::new()),
//!     StoreConfig::default(),
//! )
//! .unwrap();
//!
//! ws.modify_class("pkg/A", |class| class.major_version = 61).unwrap();
//! assert_eq!(ws.checkpoint().unwrap(), vec!["pkg/A".to_string()]);
//! assert_eq!(ws.history_len("pkg/A").unwrap(), 1);
//!
//! ws.undo("pkg/A").unwrap();
//! assert_eq!(ws.class("pkg/A").unwrap().unwrap().major_version, 52);
//! ```
//!
//! [`Backing`]: classfs_vfs::Backing

pub use bytes::Bytes;

mod cache;
mod codec;
mod config;
mod error;
mod events;
mod export;
mod history;
mod ingest;
mod key;
mod lifecycle;
mod locks;
mod registry;
mod runtime;
mod session;
mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::ProxyMap;
pub use codec::{ClassFileCodec, EntryCodec, RawCodec, UnitCodec};
pub use config::{CommitPolicy, StoreConfig};
pub use error::{BoxError, Error, Result};
pub use events::{EventBus, Notification, Subscriber, SubscriptionId, WorkspaceId};
pub use export::{EntryFailure, Export, ExportReport};
pub use history::History;
pub use ingest::{Demotion, IngestReport, Skipped, Source};
pub use key::{binary_name, internal_name, key_path, EntryKey, EntryKind};
pub use lifecycle::{Lifecycle, LifecycleState, OpGuard};
pub use locks::{KeyGuard, KeyLocks};
pub use registry::Registry;
pub use runtime::{HostError, HostRuntime, LoadEvent, LoadHook, LoadedUnit};
pub use session::Session;
pub use workspace::{CommitReport, Workspace};
