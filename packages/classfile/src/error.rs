//! Decode errors.

/// Errors raised while decoding a class file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input does not start with `0xCAFEBABE`.
    #[error("bad magic number 0x{0:08X}")]
    BadMagic(u32),

    /// The input ended before a structure was complete.
    #[error("unexpected end of input at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEnd { offset: usize, needed: usize },

    /// A constant pool entry has an unknown tag.
    #[error("unknown constant tag {tag} at pool index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    /// A constant pool reference is zero, out of range, or points at the
    /// unusable slot after a long/double.
    #[error("bad constant pool index {index}")]
    BadConstantIndex { index: u16 },

    /// A constant pool reference points at the wrong kind of entry.
    #[error("constant pool index {index} is not a {expected}")]
    WrongConstantKind { index: u16, expected: &'static str },

    /// A UTF-8 constant is not valid modified UTF-8.
    #[error("malformed modified UTF-8 in constant at index {index}")]
    InvalidUtf8 { index: u16 },

    /// The constant pool has more entries than a class file can index.
    #[error("constant pool too large")]
    PoolTooLarge,

    /// A string encodes to more bytes than a `Utf8` constant can hold.
    #[error("string of {len} encoded bytes exceeds the 65535 byte constant limit")]
    StringTooLong { len: usize },

    /// Bytes remain after the last class attribute.
    #[error("{count} trailing bytes after class file")]
    TrailingBytes { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_descriptive() {
        assert_eq!(
            DecodeError::BadMagic(0xDEADBEEF).to_string(),
            "bad magic number 0xDEADBEEF"
        );
        assert!(DecodeError::UnexpectedEnd {
            offset: 8,
            needed: 2
        }
        .to_string()
        .contains("offset 8"));
        assert!(DecodeError::WrongConstantKind {
            index: 3,
            expected: "Class"
        }
        .to_string()
        .contains("not a Class"));
    }
}
