//! Index file records.

use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;

/// Location of one log record, as stored in the index file.
///
/// Fixed 20 bytes, little-endian: `offset u64 | length u32 | seq u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset of the framed log record.
    pub offset: u64,
    /// Length of the framed log record, framing included.
    pub length: u32,
    /// Sequence number of the entry.
    pub seq: SequenceNumber,
}

impl IndexRecord {
    /// Encoded size.
    pub const SIZE: usize = 20;

    /// Creates an index record.
    #[must_use]
    pub const fn new(offset: u64, length: u32, seq: SequenceNumber) -> Self {
        Self {
            offset,
            length,
            seq,
        }
    }

    /// Offset one past the end of the log record, or `None` if a corrupt
    /// record points beyond `u64::MAX`.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length as u64)
    }

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.length.to_le_bytes());
        buf[12..20].copy_from_slice(&self.seq.as_u64().to_le_bytes());
        buf
    }

    /// Decodes a record from exactly [`Self::SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalCorruption`] if `data` has the wrong length.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() != Self::SIZE {
            return Err(CoreError::wal_corruption(format!(
                "index record must be {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&data[0..8]);
        let offset = u64::from_le_bytes(word);
        let length = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        word.copy_from_slice(&data[12..20]);
        let seq = SequenceNumber::new(u64::from_le_bytes(word));

        Ok(Self {
            offset,
            length,
            seq,
        })
    }
}
