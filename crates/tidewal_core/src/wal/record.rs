//! Log record framing.

use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;

/// Magic bytes identifying a log record.
pub const WAL_MAGIC: [u8; 4] = *b"TWAL";

/// Current log record format version.
pub const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + seq (8) + length (4) = 18 bytes
pub const HEADER_SIZE: usize = 18;

/// CRC size.
pub const CRC_SIZE: usize = 4;

/// One entry as stored in a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence number the caller assigned.
    pub seq: SequenceNumber,
    /// Opaque entry bytes.
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Maximum payload size; the length field is 4 bytes.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - HEADER_SIZE - CRC_SIZE;

    /// Creates a record.
    #[must_use]
    pub fn new(seq: SequenceNumber, payload: Vec<u8>) -> Self {
        Self { seq, payload }
    }

    /// Size of the framed record for a payload of `payload_len` bytes.
    #[must_use]
    pub const fn framed_len(payload_len: usize) -> usize {
        HEADER_SIZE + payload_len + CRC_SIZE
    }

    /// Frames `payload` for `seq` without taking ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the payload exceeds
    /// [`Self::MAX_PAYLOAD_SIZE`].
    pub fn encode_parts(seq: SequenceNumber, payload: &[u8]) -> CoreResult<Vec<u8>> {
        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(CoreError::invalid_argument(format!(
                "entry payload too large: {} bytes exceeds maximum of {} bytes",
                payload.len(),
                Self::MAX_PAYLOAD_SIZE
            )));
        }

        let mut data = Vec::with_capacity(Self::framed_len(payload.len()));
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.extend_from_slice(&seq.as_u64().to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(payload);

        // CRC32 (over everything before it)
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        Ok(data)
    }

    /// Frames the record.
    ///
    /// # Errors
    ///
    /// Same as [`Self::encode_parts`].
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Self::encode_parts(self.seq, &self.payload)
    }

    /// Parses one complete framed record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalCorruption`] for bad magic, an unknown version
    /// or a length that disagrees with `data`, and
    /// [`CoreError::ChecksumMismatch`] when the CRC does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_SIZE + CRC_SIZE {
            return Err(CoreError::wal_corruption(format!(
                "log record of {} bytes is shorter than its framing",
                data.len()
            )));
        }

        if data[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption("invalid log record magic"));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported log record version: {version}"
            )));
        }

        let mut seq_bytes = [0u8; 8];
        seq_bytes.copy_from_slice(&data[6..14]);
        let seq = SequenceNumber::new(u64::from_le_bytes(seq_bytes));

        let len = u32::from_le_bytes([data[14], data[15], data[16], data[17]]) as usize;
        if Self::framed_len(len) != data.len() {
            return Err(CoreError::wal_corruption(format!(
                "log record declares {len} payload bytes in a {} byte frame",
                data.len()
            )));
        }

        let crc_offset = HEADER_SIZE + len;
        let expected = u32::from_le_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);
        let actual = compute_crc32(&data[..crc_offset]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            seq,
            payload: data[HEADER_SIZE..crc_offset].to_vec(),
        })
    }
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
