//! CBOR helpers for serde types exchanged between nodes.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a serde value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| CodecError::CborEncode {
        message: e.to_string(),
    })?;
    Ok(bytes)
}

/// Decode a serde value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::CborDecode {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Usage {
        name: String,
        used: u64,
    }

    #[test]
    fn cbor_roundtrip() {
        let usage = Usage {
            name: "/var/lib/tidewal".to_string(),
            used: 42,
        };
        let bytes = to_cbor(&usage).unwrap();
        let decoded: Usage = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, usage);
    }

    #[test]
    fn cbor_garbage_is_error() {
        let result: CodecResult<Usage> = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::CborDecode { .. })));
    }
}
