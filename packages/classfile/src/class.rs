//! The class file header and opaque body.

use bytes::Bytes;

use crate::constant::{Constant, ConstantPool};
use crate::reader::Reader;
use crate::DecodeError;

/// The class file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// A decoded class file.
///
/// The header (through `super_class`) is decoded; the rest is kept verbatim
/// in `body` after checking that it is structurally complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    /// Zero only for `java/lang/Object`.
    pub super_class: u16,
    /// Interfaces, fields, methods and attributes, undecoded.
    pub body: Bytes,
}

impl ClassFile {
    /// Decode a class file.
    ///
    /// Fails on a bad magic number, a truncated structure, or bytes left over
    /// after the final attribute table.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::read(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;

        let body_start = reader.offset();
        skip_body(&mut reader)?;
        let body_end = reader.offset();
        let trailing = reader.rest().len();
        if trailing > 0 {
            return Err(DecodeError::TrailingBytes { count: trailing });
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            body: Bytes::copy_from_slice(&bytes[body_start..body_end]),
        })
    }

    /// Encode back to class file bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        out.extend_from_slice(&self.major_version.to_be_bytes());
        self.constant_pool.write(&mut out);
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&self.body);
        Bytes::from(out)
    }

    /// The internal name of this class (`pkg/Name`).
    pub fn name(&self) -> Result<String, DecodeError> {
        self.constant_pool.class_name(self.this_class)
    }

    /// The internal name of the superclass, or `None` for the root class.
    pub fn super_name(&self) -> Result<Option<String>, DecodeError> {
        match self.super_class {
            0 => Ok(None),
            index => self.constant_pool.class_name(index).map(Some),
        }
    }

    /// Rename the class.
    ///
    /// Appends a UTF-8 constant with the new name and repoints the `this`
    /// class entry at it. Other references to the old name are untouched.
    pub fn set_name(&mut self, internal_name: &str) -> Result<(), DecodeError> {
        let this_class = self.this_class;
        if !matches!(
            self.constant_pool.get(this_class),
            Some(Constant::Class { .. })
        ) {
            return Err(DecodeError::WrongConstantKind {
                index: this_class,
                expected: "Class",
            });
        }
        let name_index = self.constant_pool.push_utf8(internal_name)?;
        if let Some(Constant::Class { name_index: slot }) = self.constant_pool.get_mut(this_class)
        {
            *slot = name_index;
        }
        Ok(())
    }

    /// A minimal public class with no members.
    ///
    /// Fails only if a name is too long for a constant.
    pub fn synthetic(internal_name: &str, super_name: &str) -> Result<Self, DecodeError> {
        let constant_pool = ConstantPool::from_entries(vec![
            Constant::Utf8(crate::mutf8::encode(internal_name)),
            Constant::Class { name_index: 1 },
            Constant::Utf8(crate::mutf8::encode(super_name)),
            Constant::Class { name_index: 3 },
        ])?;
        Ok(Self {
            minor_version: 0,
            major_version: 52,
            constant_pool,
            // ACC_PUBLIC | ACC_SUPER
            access_flags: 0x0021,
            this_class: 2,
            super_class: 4,
            // interfaces, fields, methods, attributes: all empty
            body: Bytes::from_static(&[0u8; 8]),
        })
    }
}

fn skip_body(reader: &mut Reader<'_>) -> Result<(), DecodeError> {
    let interfaces = reader.u16()? as usize;
    reader.bytes(interfaces * 2)?;
    // fields, then methods
    for _ in 0..2 {
        let members = reader.u16()?;
        for _ in 0..members {
            // access_flags, name_index, descriptor_index
            reader.bytes(6)?;
            skip_attributes(reader)?;
        }
    }
    skip_attributes(reader)
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<(), DecodeError> {
    let count = reader.u16()?;
    for _ in 0..count {
        reader.u16()?;
        let len = reader.u32()? as usize;
        reader.bytes(len)?;
    }
    Ok(())
}
