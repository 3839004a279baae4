//! Codecs between raw slot bytes and cached values.
//!
//! A [`ProxyMap`](crate::ProxyMap) is generic over its codec, the same way the
//! store layers above a byte store pick a format. The class map uses a
//! [`UnitCodec`], which can also pull a unit's declared name out of raw bytes
//! for ingestion. Resources always use [`RawCodec`].

use std::convert::Infallible;

use bytes::Bytes;
use classfs_classfile::{ClassFile, DecodeError};

use crate::key::internal_name;

/// Decode/encode strategy for one kind of entry.
pub trait EntryCodec: Send + Sync + 'static {
    /// The decoded form held in the cache.
    type Value: Clone + Send + Sync + 'static;

    /// Decode failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode raw slot bytes.
    fn decode(&self, bytes: &Bytes) -> Result<Self::Value, Self::Error>;

    /// Encode a value. Total: every value has an encoding.
    fn encode(&self, value: &Self::Value) -> Bytes;

    /// Map a name as reported by a source to a key.
    fn normalize_key(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// A codec for compiled units.
pub trait UnitCodec: EntryCodec {
    /// Extract the declared internal name from raw unit bytes.
    fn declared_name(&self, bytes: &Bytes) -> Result<String, Self::Error>;
}

/// Identity codec: the value is the bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCodec;

impl EntryCodec for RawCodec {
    type Value = Bytes;
    type Error = Infallible;

    fn decode(&self, bytes: &Bytes) -> Result<Bytes, Infallible> {
        Ok(bytes.clone())
    }

    fn encode(&self, value: &Bytes) -> Bytes {
        value.clone()
    }
}

/// The default class codec, backed by `classfs-classfile`.
///
/// Keys are internal names; binary names from a runtime are normalized.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassFileCodec;

impl EntryCodec for ClassFileCodec {
    type Value = ClassFile;
    type Error = DecodeError;

    fn decode(&self, bytes: &Bytes) -> Result<ClassFile, DecodeError> {
        ClassFile::parse(bytes)
    }

    fn encode(&self, value: &ClassFile) -> Bytes {
        value.to_bytes()
    }

    fn normalize_key(&self, raw: &str) -> String {
        internal_name(raw)
    }
}

impl UnitCodec for ClassFileCodec {
    fn declared_name(&self, bytes: &Bytes) -> Result<String, DecodeError> {
        classfs_classfile::declared_name(bytes)
    }
}
