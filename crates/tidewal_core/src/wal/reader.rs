//! Reading entries back out of segment files.
//!
//! Readers open their own handles through the provider, so they never
//! contend with the write pair held by the segment store.

use crate::error::{CoreError, CoreResult};
use crate::segment::{IndexRecord, SegmentInfo, SegmentSet};
use crate::types::SequenceNumber;
use crate::wal::record::LogRecord;
use std::sync::Arc;
use tidewal_storage::{StorageBackend, StorageProvider};

/// Random access to the entries of one segment.
pub struct SegmentReader {
    info: SegmentInfo,
    index: Box<dyn StorageBackend>,
    log: Box<dyn StorageBackend>,
    entries: u64,
}

impl SegmentReader {
    /// Opens both files of `info` for reading.
    ///
    /// The entry count is fixed at open time; a trailing partial index
    /// record is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened.
    pub fn open(provider: &dyn StorageProvider, info: &SegmentInfo) -> CoreResult<Self> {
        let index = provider.open(info.index_path())?;
        let log = provider.open(info.log_path())?;
        let entries = index.size()? / IndexRecord::SIZE as u64;
        Ok(Self {
            info: info.clone(),
            index,
            log,
            entries,
        })
    }

    /// The segment being read.
    #[must_use]
    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    /// Number of complete index records.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries
    }

    /// Whether the segment holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Reads the `position`-th index record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `position` is out of range.
    pub fn index_record(&self, position: u64) -> CoreResult<IndexRecord> {
        if position >= self.entries {
            return Err(CoreError::invalid_argument(format!(
                "index position {position} out of range ({} entries)",
                self.entries
            )));
        }
        let bytes = self
            .index
            .read_at(position * IndexRecord::SIZE as u64, IndexRecord::SIZE)?;
        IndexRecord::decode(&bytes)
    }

    /// Reads and verifies the `position`-th entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalCorruption`] if the index points outside the
    /// log or at a record for a different sequence number, and
    /// [`CoreError::ChecksumMismatch`] if the record fails its CRC.
    pub fn read_entry(&self, position: u64) -> CoreResult<LogRecord> {
        let location = self.index_record(position)?;
        let log_size = self.log.size()?;
        if !location.end().is_some_and(|end| end <= log_size) {
            return Err(CoreError::wal_corruption(format!(
                "{} points past the end of {} (offset {} + length {} > {log_size})",
                location.seq,
                self.info.log_path().display(),
                location.offset,
                location.length
            )));
        }

        let bytes = self
            .log
            .read_at(location.offset, location.length as usize)?;
        let record = LogRecord::decode(&bytes)?;
        if record.seq != location.seq {
            return Err(CoreError::wal_corruption(format!(
                "index says {} but log record holds {}",
                location.seq, record.seq
            )));
        }
        Ok(record)
    }

    /// Position of the first entry whose sequence number is at or after `seq`.
    ///
    /// Equals [`len`](Self::len) when every entry is older.
    ///
    /// # Errors
    ///
    /// Returns an error if an index record cannot be read.
    pub fn position_of(&self, seq: SequenceNumber) -> CoreResult<u64> {
        let (mut low, mut high) = (0u64, self.entries);
        while low < high {
            let mid = low + (high - low) / 2;
            if self.index_record(mid)?.seq < seq {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low)
    }

    /// Sequence number of the newest entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the index record cannot be read.
    pub fn last_seq(&self) -> CoreResult<Option<SequenceNumber>> {
        match self.entries.checked_sub(1) {
            Some(last) => Ok(Some(self.index_record(last)?.seq)),
            None => Ok(None),
        }
    }

    /// Reads the entry with exactly `seq`, if present.
    ///
    /// # Errors
    ///
    /// Same as [`read_entry`](Self::read_entry).
    pub fn find(&self, seq: SequenceNumber) -> CoreResult<Option<LogRecord>> {
        let position = self.position_of(seq)?;
        if position < self.entries && self.index_record(position)?.seq == seq {
            return self.read_entry(position).map(Some);
        }
        Ok(None)
    }
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("first_seq", &self.info.first_seq())
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

/// Streams entries in sequence order across segments.
///
/// Segments are opened one at a time. Any read or verification error is
/// yielded once and ends the iteration.
///
/// # Example
///
/// ```ignore
/// for entry in wal.iter_from(SequenceNumber::new(100))? {
///     let entry = entry?;
///     apply(entry.seq, &entry.payload)?;
/// }
/// ```
pub struct WalIterator {
    provider: Arc<dyn StorageProvider>,
    segments: Vec<SegmentInfo>,
    next_segment: usize,
    current: Option<(SegmentReader, u64)>,
    from: SequenceNumber,
    finished: bool,
}

impl WalIterator {
    /// Creates an iterator over entries with `seq >= from`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        segments: &SegmentSet,
        from: SequenceNumber,
    ) -> Self {
        let start = segments.locate(from).unwrap_or(0);
        Self {
            provider,
            segments: segments.iter().skip(start).cloned().collect(),
            next_segment: 0,
            current: None,
            from,
            finished: false,
        }
    }

    fn fail(&mut self, error: CoreError) -> Option<CoreResult<LogRecord>> {
        self.finished = true;
        self.current = None;
        Some(Err(error))
    }
}

impl Iterator for WalIterator {
    type Item = CoreResult<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if self.current.is_none() {
                let Some(info) = self.segments.get(self.next_segment) else {
                    self.finished = true;
                    return None;
                };
                self.next_segment += 1;

                let reader = match SegmentReader::open(self.provider.as_ref(), info) {
                    Ok(reader) => reader,
                    Err(e) => return self.fail(e),
                };
                let position = match reader.position_of(self.from) {
                    Ok(position) => position,
                    Err(e) => return self.fail(e),
                };
                self.current = Some((reader, position));
            }

            let Some((reader, position)) = self.current.as_mut() else {
                continue;
            };
            if *position >= reader.len() {
                self.current = None;
                continue;
            }

            match reader.read_entry(*position) {
                Ok(record) => {
                    *position += 1;
                    return Some(Ok(record));
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl std::fmt::Debug for WalIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalIterator")
            .field("from", &self.from)
            .field("segments", &self.segments.len())
            .field("next_segment", &self.next_segment)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
