//! Core type definitions for tidewal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number of a WAL entry.
///
/// Sequence numbers are assigned by the caller and strictly increase across
/// appends. A segment is identified by the smallest sequence number it holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for SequenceNumber {
    fn from(seq: u64) -> Self {
        Self(seq)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// How hard the WAL pushes bytes to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Durability {
    /// Fsync segment files before closing them and on explicit sync.
    #[default]
    Fsync,
    /// Never fsync; rely on the operating system to write back.
    SkipFsync,
}

impl Durability {
    /// Whether flush-before-close is performed.
    #[must_use]
    pub const fn fsyncs(self) -> bool {
        matches!(self, Self::Fsync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_ordering_and_next() {
        let s1 = SequenceNumber::new(5);
        let s2 = s1.next();
        assert!(s1 < s2);
        assert_eq!(s2.as_u64(), 6);
        assert_eq!(format!("{s2}"), "seq:6");
    }

    #[test]
    fn skip_fsync_does_not_fsync() {
        assert!(Durability::Fsync.fsyncs());
        assert!(!Durability::SkipFsync.fsyncs());
        assert_eq!(Durability::default(), Durability::Fsync);
    }
}
