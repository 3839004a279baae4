//! Class file structure for classfs.
//!
//! This crate decodes just enough of a compiled class file to be useful to
//! the store: the version, the constant pool, the access flags and the
//! `this`/`super` class references. Everything after the super class index
//! (interfaces, fields, methods, attributes) is carried as an opaque body.
//! Encoding a decoded [`ClassFile`] reproduces the input byte-for-byte.
//!
//! # Example
//!
//! ```rust
//! use classfs_classfile::{declared_name, ClassFile};
//!
//! let bytes = ClassFile::synthetic("pkg/A", "java/lang/Object").unwrap().to_bytes();
//! assert_eq!(declared_name(&bytes).unwrap(), "pkg/A");
//!
//! let class = ClassFile::parse(&bytes).unwrap();
//! assert_eq!(class.to_bytes(), bytes);
//! ```

pub use bytes::Bytes;

mod class;
mod constant;
mod error;
mod mutf8;
mod reader;

pub use class::{ClassFile, MAGIC};
pub use constant::{Constant, ConstantPool};
pub use error::DecodeError;

/// Extract the declared internal name (`pkg/Name`) of a class file.
pub fn declared_name(bytes: &[u8]) -> Result<String, DecodeError> {
    ClassFile::parse(bytes)?.name()
}

/// Quick check for the class file magic number.
///
/// This does not validate the rest of the structure.
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) == MAGIC
}
