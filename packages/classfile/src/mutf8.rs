//! Modified UTF-8, the string encoding of class file constants.
//!
//! Differs from standard UTF-8 in two ways: NUL is encoded as `C0 80`, and
//! supplementary characters are encoded as a surrogate pair of 3-byte
//! sequences instead of one 4-byte sequence.

/// Decode modified UTF-8. Returns `None` on malformed input.
pub(crate) fn decode(bytes: &[u8]) -> Option<String> {
    // Fast path: plain ASCII without NUL is identical in both encodings.
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        match b0 {
            0x01..=0x7F => {
                units.push(b0);
                i += 1;
            }
            0xC0..=0xDF => {
                let b1 = continuation(bytes.get(i + 1))?;
                units.push(((b0 & 0x1F) << 6) | b1);
                i += 2;
            }
            0xE0..=0xEF => {
                let b1 = continuation(bytes.get(i + 1))?;
                let b2 = continuation(bytes.get(i + 2))?;
                units.push(((b0 & 0x0F) << 12) | (b1 << 6) | b2);
                i += 3;
            }
            _ => return None,
        }
    }

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
}

fn continuation(byte: Option<&u8>) -> Option<u16> {
    match byte {
        Some(&b) if b & 0xC0 == 0x80 => Some((b & 0x3F) as u16),
        _ => None,
    }
}

/// Encode a string as modified UTF-8.
pub(crate) fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// decode(encode(s)) == s for every Unicode string.
        #[test]
        fn prop_roundtrip(s in ".*") {
            prop_assert_eq!(decode(&encode(&s)), Some(s));
        }
    }
}
