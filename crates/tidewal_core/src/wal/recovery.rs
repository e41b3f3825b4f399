//! Repairing the tail of the write segment after a crash.
//!
//! A crash can leave the last segment with:
//!
//! - a partial trailing index record (the index write was cut short),
//! - index records whose log bytes never made it to disk, or made it torn,
//! - log bytes with no index record (the index write never happened).
//!
//! Repair walks back from the end of the index to the newest entry whose
//! log record is complete and passes its CRC, then cuts both files there.
//! Only the tail is examined; damage further back is reported by readers.

use crate::error::CoreResult;
use crate::segment::IndexRecord;
use crate::types::SequenceNumber;
use crate::wal::record::LogRecord;
use tidewal_storage::StorageBackend;

/// What [`repair_tail`] found and removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TailRepair {
    /// Entries left in the segment.
    pub entries: u64,
    /// Sequence number of the newest surviving entry.
    pub last_seq: Option<SequenceNumber>,
    /// Bytes cut from the end of the index file.
    pub index_bytes_dropped: u64,
    /// Bytes cut from the end of the log file.
    pub log_bytes_dropped: u64,
}

impl TailRepair {
    /// Whether anything was truncated.
    #[must_use]
    pub fn repaired(&self) -> bool {
        self.index_bytes_dropped > 0 || self.log_bytes_dropped > 0
    }
}

/// Truncates `index` and `log` back to their last intact entry.
///
/// # Errors
///
/// Returns a storage error if either file cannot be read or truncated.
/// Damaged records are not errors; they are dropped.
pub fn repair_tail(
    index: &mut dyn StorageBackend,
    log: &mut dyn StorageBackend,
) -> CoreResult<TailRepair> {
    let index_size = index.size()?;
    let log_size = log.size()?;
    let record_size = IndexRecord::SIZE as u64;

    let mut entries = index_size / record_size;
    let mut last = None;

    while let Some(position) = entries.checked_sub(1) {
        let bytes = index.read_at(position * record_size, IndexRecord::SIZE)?;
        let location = IndexRecord::decode(&bytes)?;
        if entry_is_intact(log, &location, log_size)? {
            last = Some(location);
            break;
        }
        tracing::warn!(seq = %location.seq, "dropping damaged entry at segment tail");
        entries = position;
    }

    let index_end = entries * record_size;
    let log_end = last.and_then(|l| l.end()).unwrap_or(0);

    let repair = TailRepair {
        entries,
        last_seq: last.map(|l| l.seq),
        index_bytes_dropped: index_size - index_end,
        log_bytes_dropped: log_size.saturating_sub(log_end),
    };

    if repair.index_bytes_dropped > 0 {
        index.truncate(index_end)?;
        tracing::warn!(
            dropped = repair.index_bytes_dropped,
            entries,
            "truncated index tail"
        );
    }
    if repair.log_bytes_dropped > 0 {
        log.truncate(log_end)?;
        tracing::warn!(dropped = repair.log_bytes_dropped, "truncated orphan log bytes");
    }

    Ok(repair)
}

fn entry_is_intact(
    log: &dyn StorageBackend,
    location: &IndexRecord,
    log_size: u64,
) -> CoreResult<bool> {
    match location.end() {
        Some(end) if end <= log_size => {}
        _ => return Ok(false),
    }
    let bytes = log.read_at(location.offset, location.length as usize)?;
    Ok(matches!(LogRecord::decode(&bytes), Ok(record) if record.seq == location.seq))
}
