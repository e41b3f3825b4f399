//! Segment store: the ordered segment set plus the live write pair.

use crate::error::{CoreError, CoreResult};
use crate::segment::record::IndexRecord;
use crate::segment::set::{SegmentInfo, SegmentSet};
use crate::types::{Durability, SequenceNumber};
use crate::wal::LogRecord;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidewal_storage::{StorageBackend, StorageProvider};

/// Lifecycle of a [`SegmentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// No segment is open for writing.
    NoActiveSegment,
    /// The segment under the write cursor has both handles open.
    Active,
    /// Shut down; every write is refused.
    Closed,
    /// A rotation failed after closing a handle. Writes are refused until
    /// the WAL is reopened.
    Torn,
}

/// Owns the segment set and the index/log handles of the write segment.
///
/// At most one segment is open at a time. The write cursor is its position
/// in the set.
pub struct SegmentStore {
    pub(super) provider: Arc<dyn StorageProvider>,
    pub(super) root: PathBuf,
    pub(super) durability: Durability,
    pub(super) segments: SegmentSet,
    pub(super) index: Option<Box<dyn StorageBackend>>,
    pub(super) log: Option<Box<dyn StorageBackend>>,
    pub(super) write_cursor: Option<usize>,
    pub(super) state: StoreState,
}

impl SegmentStore {
    /// Opens the store rooted at `root`, discovering existing segments.
    ///
    /// No handles are opened; call
    /// [`open_initial_segment`](Self::open_initial_segment) for that.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn open(
        provider: Arc<dyn StorageProvider>,
        root: &Path,
        durability: Durability,
    ) -> CoreResult<Self> {
        let segments = SegmentSet::discover(provider.as_ref(), root)?;
        tracing::debug!(root = %root.display(), segments = segments.len(), "discovered segments");

        Ok(Self {
            provider,
            root: root.to_path_buf(),
            durability,
            segments,
            index: None,
            log: None,
            write_cursor: None,
            state: StoreState::NoActiveSegment,
        })
    }

    /// Registers a new segment starting at `first_seq` after every existing one.
    ///
    /// The files are created when the segment is first opened.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `first_seq` does not exceed
    /// the last segment's, and a state error if the store is closed or torn.
    pub fn create_segment(&mut self, first_seq: SequenceNumber) -> CoreResult<usize> {
        self.ensure_writable()?;
        let position = self
            .segments
            .push(SegmentInfo::new(&self.root, first_seq))?;
        tracing::info!(%first_seq, position, "created segment");
        Ok(position)
    }

    /// Writes one entry to the active segment.
    ///
    /// The framed record goes to the log first, then its location to the
    /// index. If either write fails, both files are cut back to where they
    /// were so the next entry lands at the offset the index records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] without an active segment, a
    /// state error if closed or torn, and storage errors from either file.
    /// If a failed write cannot be undone the store is torn and
    /// [`CoreError::SegmentsTorn`] is returned.
    pub fn write_entry(
        &mut self,
        seq: SequenceNumber,
        payload: &[u8],
    ) -> CoreResult<IndexRecord> {
        self.ensure_writable()?;
        let (Some(index), Some(log)) = (self.index.as_mut(), self.log.as_mut()) else {
            return Err(CoreError::invalid_operation("no active segment"));
        };

        let framed = LogRecord::encode_parts(seq, payload)?;
        let length = u32::try_from(framed.len())
            .map_err(|_| CoreError::invalid_argument("log record too large"))?;

        let log_size = log.size()?;
        let offset = match log.append(&framed) {
            Ok(offset) => offset,
            Err(e) => {
                // Part of the record may have reached the file.
                if let Err(undo) = log.truncate(log_size) {
                    return Err(self.tear(format!(
                        "log append for {seq} failed ({e}) and could not be undone: {undo}"
                    )));
                }
                return Err(e.into());
            }
        };
        let record = IndexRecord::new(offset, length, seq);

        let index_size = index.size()?;
        if let Err(e) = index.append(&record.encode()) {
            if let Err(undo) = index.truncate(index_size).and(log.truncate(offset)) {
                return Err(self.tear(format!(
                    "index append for {seq} failed ({e}) and could not be undone: {undo}"
                )));
            }
            return Err(e.into());
        }

        Ok(record)
    }

    /// Syncs the active log, then the active index.
    ///
    /// # Errors
    ///
    /// Returns an error if either sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.ensure_writable()?;
        if let Some(log) = self.log.as_mut() {
            log.sync()?;
        }
        if let Some(index) = self.index.as_mut() {
            index.sync()?;
        }
        Ok(())
    }

    /// Flushes and releases the active pair and refuses further writes.
    ///
    /// The store ends up `Closed` even when releasing a handle fails.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while closing the handles.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.state == StoreState::Closed {
            return Ok(());
        }

        let result = if self.state == StoreState::Torn {
            // Whatever survived the failed rotation is released without sync.
            let index = self.index.take().map_or(Ok(()), |h| h.close());
            let log = self.log.take().map_or(Ok(()), |h| h.close());
            index.and(log).map_err(CoreError::from)
        } else {
            self.close_active()
        };

        self.index = None;
        self.log = None;
        self.write_cursor = None;
        self.state = StoreState::Closed;
        tracing::debug!(root = %self.root.display(), "segment store closed");
        result
    }

    /// Releases the active pair: sync (unless `SkipFsync`) and close the log,
    /// then sync and close the index.
    ///
    /// A log sync failure returns before anything is released. A failure
    /// after the log was released tears the store.
    pub(super) fn close_active(&mut self) -> CoreResult<()> {
        let fsync = self.durability.fsyncs();

        if let Some(log) = self.log.as_mut() {
            if fsync {
                log.sync()?;
            }
        }

        let mut released = false;
        if let Some(log) = self.log.take() {
            released = true;
            if let Err(e) = log.close() {
                return Err(self.tear(format!("closing log failed: {e}")));
            }
        }

        if let Some(index) = self.index.as_mut() {
            if fsync {
                if let Err(e) = index.sync() {
                    return Err(if released {
                        self.tear(format!("syncing index after log close failed: {e}"))
                    } else {
                        e.into()
                    });
                }
            }
        }

        if let Some(index) = self.index.take() {
            if let Err(e) = index.close() {
                return Err(self.tear(format!("closing index failed: {e}")));
            }
        }

        self.write_cursor = None;
        if self.state == StoreState::Active {
            self.state = StoreState::NoActiveSegment;
        }
        Ok(())
    }

    /// Marks the store torn and builds the error to return.
    pub(super) fn tear(&mut self, message: String) -> CoreError {
        tracing::error!(root = %self.root.display(), %message, "segment store torn");
        self.state = StoreState::Torn;
        self.write_cursor = None;
        CoreError::segments_torn(message)
    }

    pub(super) fn ensure_writable(&self) -> CoreResult<()> {
        match self.state {
            StoreState::Closed => Err(CoreError::WalClosed),
            StoreState::Torn => Err(CoreError::segments_torn(
                "an earlier rotation failed; reopen the WAL",
            )),
            StoreState::NoActiveSegment | StoreState::Active => Ok(()),
        }
    }

    /// Size of the active log, or `None` without an active segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn active_log_size(&self) -> CoreResult<Option<u64>> {
        match self.log.as_ref() {
            Some(log) => Ok(Some(log.size()?)),
            None => Ok(None),
        }
    }

    /// Index and log handles of the active segment.
    #[allow(clippy::type_complexity)]
    pub(crate) fn active_pair_mut(
        &mut self,
    ) -> Option<(&mut Box<dyn StorageBackend>, &mut Box<dyn StorageBackend>)> {
        match (self.index.as_mut(), self.log.as_mut()) {
            (Some(index), Some(log)) => Some((index, log)),
            _ => None,
        }
    }

    /// Segment under the write cursor.
    #[must_use]
    pub fn active_segment(&self) -> Option<&SegmentInfo> {
        self.write_cursor.and_then(|pos| self.segments.get(pos))
    }

    /// Position of the write segment in [`segments`](Self::segments).
    #[must_use]
    pub fn write_cursor(&self) -> Option<usize> {
        self.write_cursor
    }

    /// All known segments, oldest first.
    #[must_use]
    pub fn segments(&self) -> &SegmentSet {
        &self.segments
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Directory holding the segment files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Provider the segment files are opened through.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }
}

impl fmt::Debug for SegmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentStore")
            .field("root", &self.root)
            .field("durability", &self.durability)
            .field("segments", &self.segments.len())
            .field("write_cursor", &self.write_cursor)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tidewal_storage::{InMemoryBackend, InMemoryProvider, StorageError, StorageResult};

    fn memory_store() -> (Arc<InMemoryProvider>, SegmentStore) {
        let provider = Arc::new(InMemoryProvider::new());
        let store = SegmentStore::open(provider.clone(), Path::new("/wal"), Durability::Fsync)
            .unwrap();
        (provider, store)
    }

    #[test]
    fn new_store_has_no_active_segment() {
        let (_, mut store) = memory_store();
        assert_eq!(store.state(), StoreState::NoActiveSegment);
        assert!(store.active_segment().is_none());
        assert!(store.active_log_size().unwrap().is_none());
        assert!(matches!(
            store.write_entry(SequenceNumber::new(1), b"x"),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn write_entry_appends_log_then_index() {
        let (provider, mut store) = memory_store();
        store.create_segment(SequenceNumber::new(1)).unwrap();
        store.rotate_to(SequenceNumber::new(1)).unwrap();

        let first = store.write_entry(SequenceNumber::new(1), b"alpha").unwrap();
        let second = store.write_entry(SequenceNumber::new(2), b"beta").unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(Some(second.offset), first.end());

        let info = store.active_segment().unwrap().clone();
        let index = provider.get(info.index_path()).unwrap().data();
        assert_eq!(index.len(), 2 * IndexRecord::SIZE);
        assert_eq!(IndexRecord::decode(&index[20..40]).unwrap(), second);

        let log = provider.get(info.log_path()).unwrap().data();
        let end = second.end().unwrap() as usize;
        let record = LogRecord::decode(&log[second.offset as usize..end]).unwrap();
        assert_eq!(record.payload, b"beta");
        assert_eq!(store.active_log_size().unwrap(), second.end());
    }

    #[test]
    fn create_segment_requires_increasing_first_seq() {
        let (_, mut store) = memory_store();
        store.create_segment(SequenceNumber::new(10)).unwrap();
        assert!(matches!(
            store.create_segment(SequenceNumber::new(10)),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert_eq!(store.create_segment(SequenceNumber::new(11)).unwrap(), 1);
    }

    #[test]
    fn close_refuses_further_writes() {
        let (_, mut store) = memory_store();
        store.create_segment(SequenceNumber::new(0)).unwrap();
        store.rotate_to(SequenceNumber::new(0)).unwrap();
        store.write_entry(SequenceNumber::new(0), b"x").unwrap();

        store.close().unwrap();
        assert_eq!(store.state(), StoreState::Closed);
        assert!(store.write_cursor().is_none());
        assert!(matches!(
            store.write_entry(SequenceNumber::new(1), b"y"),
            Err(CoreError::WalClosed)
        ));
        assert!(matches!(
            store.create_segment(SequenceNumber::new(5)),
            Err(CoreError::WalClosed)
        ));
        store.close().unwrap();
    }

    #[test]
    fn reopen_discovers_written_segments() {
        let (provider, mut store) = memory_store();
        for first in [0, 100] {
            store.create_segment(SequenceNumber::new(first)).unwrap();
            store.rotate_to(SequenceNumber::new(first)).unwrap();
            store.write_entry(SequenceNumber::new(first), b"e").unwrap();
        }
        store.close().unwrap();

        let reopened =
            SegmentStore::open(provider, Path::new("/wal"), Durability::Fsync).unwrap();
        assert_eq!(reopened.segments().len(), 2);
        assert_eq!(
            reopened.segments().last().unwrap().first_seq(),
            SequenceNumber::new(100)
        );
    }

    /// Switches for [`ShortWriteBackend`].
    #[derive(Default)]
    struct WriteFaults {
        short_log_write: AtomicBool,
        fail_log_truncate: AtomicBool,
    }

    /// Log handle that can write half of an append and then fail, like a
    /// `write_all` cut short by a full disk.
    struct ShortWriteBackend {
        inner: InMemoryBackend,
        is_log: bool,
        faults: Arc<WriteFaults>,
    }

    fn disk_full() -> StorageError {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
    }

    impl StorageBackend for ShortWriteBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.is_log && self.faults.short_log_write.load(Ordering::SeqCst) {
                self.inner.append(&data[..data.len() / 2])?;
                return Err(disk_full());
            }
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            if self.is_log && self.faults.fail_log_truncate.load(Ordering::SeqCst) {
                return Err(disk_full());
            }
            self.inner.truncate(new_size)
        }
    }

    struct ShortWriteProvider {
        inner: InMemoryProvider,
        faults: Arc<WriteFaults>,
    }

    impl StorageProvider for ShortWriteProvider {
        fn open(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
            self.inner.open(path)?;
            let inner = self.inner.get(path).ok_or_else(disk_full)?;
            Ok(Box::new(ShortWriteBackend {
                inner,
                is_log: path.extension().and_then(|e| e.to_str()) == Some("log"),
                faults: Arc::clone(&self.faults),
            }))
        }

        fn list(&self, dir: &Path) -> StorageResult<Vec<PathBuf>> {
            self.inner.list(dir)
        }
    }

    fn short_write_store() -> (Arc<WriteFaults>, Arc<ShortWriteProvider>, SegmentStore) {
        let faults = Arc::new(WriteFaults::default());
        let provider = Arc::new(ShortWriteProvider {
            inner: InMemoryProvider::new(),
            faults: Arc::clone(&faults),
        });
        let mut store =
            SegmentStore::open(provider.clone(), Path::new("/wal"), Durability::Fsync).unwrap();
        store.create_segment(SequenceNumber::new(1)).unwrap();
        store.rotate_to(SequenceNumber::new(1)).unwrap();
        (faults, provider, store)
    }

    #[test]
    fn short_log_write_is_cut_back() {
        let (faults, provider, mut store) = short_write_store();
        let first = store.write_entry(SequenceNumber::new(1), b"alpha").unwrap();

        faults.short_log_write.store(true, Ordering::SeqCst);
        assert!(store.write_entry(SequenceNumber::new(2), b"lost").is_err());
        faults.short_log_write.store(false, Ordering::SeqCst);

        assert_eq!(store.state(), StoreState::Active);
        assert_eq!(store.active_log_size().unwrap(), first.end());

        let third = store.write_entry(SequenceNumber::new(3), b"gamma").unwrap();
        assert_eq!(Some(third.offset), first.end());

        let info = store.active_segment().unwrap().clone();
        let log = provider.inner.get(info.log_path()).unwrap().data();
        let record = LogRecord::decode(&log[third.offset as usize..]).unwrap();
        assert_eq!(record.seq, SequenceNumber::new(3));
        assert_eq!(record.payload, b"gamma");

        let index = provider.inner.get(info.index_path()).unwrap().data();
        assert_eq!(index.len(), 2 * IndexRecord::SIZE);
    }

    #[test]
    fn short_log_write_that_cannot_be_undone_tears_store() {
        let (faults, _provider, mut store) = short_write_store();
        store.write_entry(SequenceNumber::new(1), b"alpha").unwrap();

        faults.short_log_write.store(true, Ordering::SeqCst);
        faults.fail_log_truncate.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.write_entry(SequenceNumber::new(2), b"lost"),
            Err(CoreError::SegmentsTorn { .. })
        ));
        assert_eq!(store.state(), StoreState::Torn);

        faults.short_log_write.store(false, Ordering::SeqCst);
        assert!(matches!(
            store.write_entry(SequenceNumber::new(3), b"gamma"),
            Err(CoreError::SegmentsTorn { .. })
        ));
    }
}
