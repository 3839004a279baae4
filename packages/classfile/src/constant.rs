//! The constant pool.

use crate::mutf8;
use crate::reader::Reader;
use crate::DecodeError;

/// One constant pool entry.
///
/// UTF-8 constants keep their exact encoded bytes so that re-encoding a pool
/// never changes a byte, even for strings that are not valid Unicode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(i32),
    /// Raw IEEE-754 bits, kept as bits so NaN payloads survive.
    Float(u32),
    Long(i64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// The slot after a `Long` or `Double`, which the format leaves unusable.
    Unusable,
}

impl Constant {
    fn tag(&self) -> Option<u8> {
        Some(match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class { .. } => 7,
            Constant::String { .. } => 8,
            Constant::Fieldref { .. } => 9,
            Constant::Methodref { .. } => 10,
            Constant::InterfaceMethodref { .. } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType { .. } => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module { .. } => 19,
            Constant::Package { .. } => 20,
            Constant::Unusable => return None,
        })
    }

    /// Long and double constants occupy two pool slots.
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// The constant pool of a class file, indexed from 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool of narrow constants, in order. Used for small pools built
    /// in-crate that cannot overflow the slot count.
    pub(crate) fn from_entries(entries: Vec<Constant>) -> Result<Self, DecodeError> {
        for constant in &entries {
            if let Constant::Utf8(bytes) = constant {
                check_utf8_len(bytes)?;
            }
        }
        Ok(Self { entries })
    }

    /// Number of slots, including unusable ones (one less than the
    /// `constant_pool_count` written to the file).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a slot by its 1-based index.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        match index {
            0 => None,
            i => self.entries.get(i as usize - 1),
        }
    }

    pub(crate) fn get_mut(&mut self, index: u16) -> Option<&mut Constant> {
        match index {
            0 => None,
            i => self.entries.get_mut(i as usize - 1),
        }
    }

    /// Append a constant and return its index. Wide constants take two slots.
    ///
    /// A `Utf8` constant longer than 65535 bytes is rejected, so every pool
    /// built through here encodes without truncation.
    pub fn push(&mut self, constant: Constant) -> Result<u16, DecodeError> {
        if let Constant::Utf8(bytes) = &constant {
            check_utf8_len(bytes)?;
        }
        let wide = constant.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.entries.len() + needed > u16::MAX as usize - 1 {
            return Err(DecodeError::PoolTooLarge);
        }
        self.entries.push(constant);
        let index = self.entries.len() as u16;
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Decode the string held by a `Utf8` constant.
    pub fn utf8(&self, index: u16) -> Result<String, DecodeError> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => {
                mutf8::decode(bytes).ok_or(DecodeError::InvalidUtf8 { index })
            }
            Some(Constant::Unusable) | None => Err(DecodeError::BadConstantIndex { index }),
            Some(_) => Err(DecodeError::WrongConstantKind {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolve a `Class` constant to its internal name.
    pub fn class_name(&self, index: u16) -> Result<String, DecodeError> {
        match self.get(index) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            Some(Constant::Unusable) | None => Err(DecodeError::BadConstantIndex { index }),
            Some(_) => Err(DecodeError::WrongConstantKind {
                index,
                expected: "Class",
            }),
        }
    }

    /// Append a `Utf8` constant holding `s`.
    pub fn push_utf8(&mut self, s: &str) -> Result<u16, DecodeError> {
        self.push(Constant::Utf8(mutf8::encode(s)))
    }

    /// Append a `Class` constant (and its name) for `internal_name`.
    pub fn push_class(&mut self, internal_name: &str) -> Result<u16, DecodeError> {
        let name_index = self.push_utf8(internal_name)?;
        self.push(Constant::Class { name_index })
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let count = reader.u16()?;
        let mut pool = ConstantPool {
            entries: Vec::with_capacity(count.saturating_sub(1) as usize),
        };

        let mut index: u16 = 1;
        while index < count {
            let tag = reader.u8()?;
            let constant = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(reader.bytes(len)?.to_vec())
                }
                3 => Constant::Integer(reader.u32()? as i32),
                4 => Constant::Float(reader.u32()?),
                5 => Constant::Long(reader.u64()? as i64),
                6 => Constant::Double(reader.u64()?),
                7 => Constant::Class {
                    name_index: reader.u16()?,
                },
                8 => Constant::String {
                    string_index: reader.u16()?,
                },
                9 => Constant::Fieldref {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                10 => Constant::Methodref {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                11 => Constant::InterfaceMethodref {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                12 => Constant::NameAndType {
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                },
                15 => Constant::MethodHandle {
                    reference_kind: reader.u8()?,
                    reference_index: reader.u16()?,
                },
                16 => Constant::MethodType {
                    descriptor_index: reader.u16()?,
                },
                17 => Constant::Dynamic {
                    bootstrap_method_attr_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap_method_attr_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                19 => Constant::Module {
                    name_index: reader.u16()?,
                },
                20 => Constant::Package {
                    name_index: reader.u16()?,
                },
                tag => return Err(DecodeError::UnknownConstantTag { tag, index }),
            };

            let wide = constant.is_wide();
            pool.entries.push(constant);
            index += 1;
            if wide {
                // A long/double in the last slot would overrun the pool.
                if index >= count {
                    return Err(DecodeError::BadConstantIndex { index });
                }
                pool.entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(pool)
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&((self.entries.len() + 1) as u16).to_be_bytes());
        for constant in &self.entries {
            let Some(tag) = constant.tag() else {
                continue;
            };
            out.push(tag);
            match constant {
                Constant::Utf8(bytes) => {
                    // Length bounded by `check_utf8_len` on every way in.
                    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend_from_slice(&bytes[..len as usize]);
                }
                Constant::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
                Constant::Float(bits) => out.extend_from_slice(&bits.to_be_bytes()),
                Constant::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
                Constant::Double(bits) => out.extend_from_slice(&bits.to_be_bytes()),
                Constant::Class { name_index: a }
                | Constant::String { string_index: a }
                | Constant::MethodType {
                    descriptor_index: a,
                }
                | Constant::Module { name_index: a }
                | Constant::Package { name_index: a } => out.extend_from_slice(&a.to_be_bytes()),
                Constant::Fieldref {
                    class_index: a,
                    name_and_type_index: b,
                }
                | Constant::Methodref {
                    class_index: a,
                    name_and_type_index: b,
                }
                | Constant::InterfaceMethodref {
                    class_index: a,
                    name_and_type_index: b,
                }
                | Constant::NameAndType {
                    name_index: a,
                    descriptor_index: b,
                }
                | Constant::Dynamic {
                    bootstrap_method_attr_index: a,
                    name_and_type_index: b,
                }
                | Constant::InvokeDynamic {
                    bootstrap_method_attr_index: a,
                    name_and_type_index: b,
                } => {
                    out.extend_from_slice(&a.to_be_bytes());
                    out.extend_from_slice(&b.to_be_bytes());
                }
                Constant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    out.push(*reference_kind);
                    out.extend_from_slice(&reference_index.to_be_bytes());
                }
                Constant::Unusable => {}
            }
        }
    }
}

fn check_utf8_len(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.len() > u16::MAX as usize {
        return Err(DecodeError::StringTooLong { len: bytes.len() });
    }
    Ok(())
}
