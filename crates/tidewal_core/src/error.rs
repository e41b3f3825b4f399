//! Error types for tidewal core.

use crate::types::SequenceNumber;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in tidewal core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tidewal_storage::StorageError),

    /// Binary or CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] tidewal_codec::CodecError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An argument was rejected before any state was touched.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// An allocation could not be satisfied.
    #[error("out of memory: failed to reserve {requested_bytes} bytes")]
    OutOfMemory {
        /// Size of the failed reservation.
        requested_bytes: usize,
    },

    /// The filter already holds its maximum number of sub-filters.
    #[error("filter capacity exhausted: {max_filters} sub-filters in use")]
    FilterCapacityExhausted {
        /// The sub-filter cap that was hit.
        max_filters: u32,
    },

    /// The filter latched invalid and refuses further inserts.
    #[error("filter is invalid and refuses inserts")]
    FilterInvalid,

    /// Serialized filter bytes were well-formed fields but inconsistent.
    #[error("malformed filter: {message}")]
    MalformedFilter {
        /// Description of the inconsistency.
        message: String,
    },

    /// WAL is corrupted or invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// No retained segment starts at or before the requested sequence number.
    ///
    /// This is a caller bug: rotation must never target a sequence number
    /// older than the earliest retained segment.
    #[error("no segment covers {seq}")]
    NoCoveringSegment {
        /// The requested sequence number.
        seq: SequenceNumber,
    },

    /// A rotation failed after closing a handle; the WAL must be reopened.
    #[error("segment handles torn by failed rotation: {message}")]
    SegmentsTorn {
        /// What was left in an undefined state.
        message: String,
    },

    /// An append did not advance the sequence number.
    #[error("sequence {seq} does not follow last appended {last}")]
    SequenceOutOfOrder {
        /// The rejected sequence number.
        seq: SequenceNumber,
        /// The last accepted sequence number.
        last: SequenceNumber,
    },

    /// Another process holds the WAL directory lock.
    #[error("WAL locked: another process has exclusive access")]
    WalLocked,

    /// The WAL has been closed.
    #[error("WAL is closed")]
    WalClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a malformed filter error.
    pub fn malformed_filter(message: impl Into<String>) -> Self {
        Self::MalformedFilter {
            message: message.into(),
        }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates a torn segments error.
    pub fn segments_torn(message: impl Into<String>) -> Self {
        Self::SegmentsTorn {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
