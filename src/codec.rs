//! Wire codec for ciphertext byte sequences.
//!
//! Clients ship encrypted bytes as a JSON object keyed by decimal string
//! indices (`{"0": 12, "1": 255, ...}`). This module converts that shape to
//! and from `Vec<u8>` and provides the lowercase-hex helpers used for the
//! database columns. Indices must be exactly `0..len`; gaps, duplicates via
//! non-canonical keys, and non-numeric keys are rejected instead of being
//! silently skipped.

use std::collections::BTreeMap;

/// JSON wire shape for a byte sequence.
pub type ByteMap = BTreeMap<String, u8>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("byte map index is not a decimal integer: {0:?}")]
    NonNumericIndex(String),
    #[error("byte map indices are not contiguous: index {0} out of range for {1} entries")]
    IndexOutOfRange(usize, usize),
    #[error("byte map index {0} appears more than once")]
    DuplicateIndex(usize),
    #[error("stored ciphertext is not valid hex")]
    InvalidStoredHex,
}

/// Decode a wire byte map into an ordered byte sequence.
///
/// # Errors
/// Returns [`CodecError`] when any key is not a decimal index or the index
/// set is not exactly `0..map.len()`.
pub fn decode(map: &ByteMap) -> Result<Vec<u8>, CodecError> {
    let len = map.len();
    let mut bytes = vec![0u8; len];
    let mut seen = vec![false; len];

    for (key, &value) in map {
        // Reject leading '+', whitespace and empty keys along with non-digits.
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::NonNumericIndex(key.clone()));
        }
        let index: usize = key
            .parse()
            .map_err(|_| CodecError::NonNumericIndex(key.clone()))?;
        if index >= len {
            return Err(CodecError::IndexOutOfRange(index, len));
        }
        if seen[index] {
            // Only reachable via non-canonical keys like "01" vs "1".
            return Err(CodecError::DuplicateIndex(index));
        }
        seen[index] = true;
        bytes[index] = value;
    }

    // len distinct in-range indices means the set was exactly 0..len,
    // so a gap always surfaces as an out-of-range index above.
    Ok(bytes)
}

/// Encode a byte sequence as the wire byte map (`{"0": b0, "1": b1, ...}`).
#[must_use]
pub fn encode(bytes: &[u8]) -> ByteMap {
    bytes
        .iter()
        .enumerate()
        .map(|(index, &byte)| (index.to_string(), byte))
        .collect()
}

/// Lowercase hex for ciphertext columns.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a stored ciphertext column back into bytes.
///
/// # Errors
/// Returns [`CodecError::InvalidStoredHex`] when the column does not hold
/// valid hex; stored rows are server-written, so this indicates corruption.
pub fn from_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(text).map_err(|_| CodecError::InvalidStoredHex)
}

/// Decode a stored ciphertext column straight into the wire byte map.
///
/// # Errors
/// Returns [`CodecError::InvalidStoredHex`] on a corrupt column.
pub fn hex_to_map(text: &str) -> Result<ByteMap, CodecError> {
    Ok(encode(&from_hex(text)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn map_of(bytes: &[u8]) -> ByteMap {
        bytes
            .iter()
            .enumerate()
            .map(|(index, &byte)| (index.to_string(), byte))
            .collect()
    }

    #[test]
    fn decode_encode_round_trip() {
        for bytes in [&b""[..], &b"\x00"[..], &b"hello world"[..], &[0xff; 300]] {
            let encoded = encode(bytes);
            assert_eq!(decode(&encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn encode_decode_round_trip_on_wire_maps() {
        let map = map_of(&[9, 8, 7, 6, 5]);
        let decoded = decode(&map).unwrap();
        assert_eq!(encode(&decoded), map);
    }

    #[test]
    fn decode_orders_numerically_not_lexically() {
        // 12 entries: lexical order would read "10" before "2".
        let bytes: Vec<u8> = (0..12).collect();
        let map = map_of(&bytes);
        assert_eq!(decode(&map).unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_gap() {
        let mut map = map_of(&[1, 2, 3]);
        map.remove("1");
        assert_eq!(decode(&map), Err(CodecError::IndexOutOfRange(2, 2)));
    }

    #[test]
    fn decode_rejects_non_numeric_keys() {
        let mut map = ByteMap::new();
        map.insert("a".to_string(), 1);
        assert_eq!(decode(&map), Err(CodecError::NonNumericIndex("a".into())));

        let mut map = ByteMap::new();
        map.insert("-1".to_string(), 1);
        assert!(matches!(decode(&map), Err(CodecError::NonNumericIndex(_))));
    }

    #[test]
    fn decode_rejects_non_canonical_duplicate_indices() {
        let mut map = ByteMap::new();
        map.insert("00".to_string(), 2);
        map.insert("1".to_string(), 1);
        map.insert("0".to_string(), 1);
        map.insert("01".to_string(), 2);
        assert!(matches!(
            decode(&map),
            Err(CodecError::DuplicateIndex(0 | 1))
        ));
    }

    #[test]
    fn hex_round_trip_is_lowercase() {
        let bytes = [0xDEu8, 0xAD, 0xBE, 0xEF];
        let text = to_hex(&bytes);
        assert_eq!(text, "deadbeef");
        assert_eq!(from_hex(&text).unwrap(), bytes);
    }

    #[test]
    fn hex_to_map_rejects_corrupt_column() {
        assert_eq!(hex_to_map("zz"), Err(CodecError::InvalidStoredHex));
        let map = hex_to_map("0a0b").unwrap();
        assert_eq!(decode(&map).unwrap(), vec![0x0a, 0x0b]);
    }
}
