//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before a field could be read in full.
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the field being read.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// A field was read in full but holds a value outside its allowed range.
    #[error("invalid value: {message}")]
    InvalidValue {
        /// Description of the offending field.
        message: String,
    },

    /// Input remained after a value that must span the whole buffer.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },

    /// Failed to encode value to CBOR.
    #[error("CBOR encoding failed: {message}")]
    CborEncode {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode CBOR bytes.
    #[error("CBOR decoding failed: {message}")]
    CborDecode {
        /// Description of the decoding error.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }
}
