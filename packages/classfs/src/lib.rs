//! classfs: a versioned store for class files and resources.
//!
//! classfs ingests a compiled program, either a single class file, a ZIP
//! archive, or the units loaded in a live runtime, into a virtual filesystem
//! and lets callers read, edit, checkpoint, undo and reassemble it.
//!
//! The workspace is layered:
//!
//! - [`vfs`]: path-addressed byte storage (in memory or on disk).
//! - [`classfile`]: the default class codec (header and constant pool).
//! - The core (re-exported at the top level): registry, decode cache,
//!   history, ingestion, export, live redefinition and notifications.
//!
//! # Example
//!
//! ```rust
//! use classfs::classfile::ClassFile;
//! use classfs::{ClassFileCodec, Session, Source, StoreConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let input = dir.path().join("Main.class");
//! let class = ClassFile::synthetic("app/Main", "java/lang/Object").unwrap();
//! std::fs::write(&input, class.to_bytes()).unwrap();
//!
//! let session = Session::new(ClassFileCodec, StoreConfig::default());
//! let ws = session.open(Source::file(&input)).unwrap();
//!
//! ws.modify_class("app/Main", |c| c.access_flags |= 0x0010).unwrap();
//! ws.checkpoint().unwrap();
//!
//! let report = ws.export(dir.path().join("out.jar")).unwrap();
//! assert_eq!(report.reencoded, vec!["app/Main".to_string()]);
//! ```

pub use classfs_classfile as classfile;
pub use classfs_vfs as vfs;

pub use classfs_core::*;
