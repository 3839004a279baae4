//! classfs VFS: the byte layer.
//!
//! Everything above this crate reads and writes artifact bytes through a
//! [`Backing`]. Current values, history snapshots and original inputs all live
//! here uniformly, which is what lets the upper layers treat "current" and
//! "historical" bytes identically.
//!
//! Nothing at this level knows about classes, resources or codecs. A backing
//! stores opaque byte payloads at absolute, `/`-separated [`VfsPath`]s and
//! creates parent directories implicitly on write.
//!
//! # Example
//!
//! ```rust
//! use classfs_vfs::{Backing, MemoryBacking, VfsPath};
//! use bytes::Bytes;
//!
//! let vfs = MemoryBacking::new();
//! let path = VfsPath::from_key("pkg/Main").unwrap();
//!
//! vfs.write(&path, Bytes::from_static(b"\xCA\xFE\xBA\xBE")).unwrap();
//! assert!(vfs.exists(&path));
//! assert_eq!(path.to_string(), "/pkg/Main");
//! ```

pub use bytes::Bytes;

mod disk;
mod error;
mod memory;
mod path;
mod traits;

pub use disk::DiskBacking;
pub use error::{Result, VfsError};
pub use memory::MemoryBacking;
pub use path::{PathError, VfsPath};
pub use traits::{Backing, SharedBacking};
