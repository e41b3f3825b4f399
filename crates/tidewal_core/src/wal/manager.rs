//! The WAL facade.

use crate::config::WalConfig;
use crate::dir::WalDir;
use crate::error::{CoreError, CoreResult};
use crate::filter::{codec, Membership, ScalableBloomFilter};
use crate::segment::{IndexRecord, SegmentSet, SegmentStore};
use crate::stats::{StatsSnapshot, WalStats};
use crate::types::SequenceNumber;
use crate::wal::reader::{SegmentReader, WalIterator};
use crate::wal::recovery::repair_tail;
use parking_lot::Mutex;
use std::sync::Arc;
use tidewal_storage::{FileProvider, StorageProvider};

/// What to do with an entry seen during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDecision {
    /// First sighting; hand it to the apply path.
    Apply,
    /// Already applied (or a filter false positive); skip it.
    Skip,
}

/// Totals of a deduplicating replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Entries handed to the callback.
    pub applied: u64,
    /// Entries the duplicate check skipped.
    pub skipped: u64,
}

struct WalInner {
    store: SegmentStore,
    last_seq: Option<SequenceNumber>,
}

/// A segmented write-ahead log with an optional duplicate filter.
///
/// All writes go through one mutex: the decision to rotate, the rotation
/// and the entry write happen as one step. Reads open their own handles and
/// do not take that mutex for I/O.
///
/// # Example
///
/// ```rust,ignore
/// use tidewal_core::{SequenceNumber, WalConfig, WalManager};
///
/// let wal = WalManager::open(WalConfig::new("/var/lib/tidewal/vnode2/wal"))?;
/// wal.append(SequenceNumber::new(1), b"cpu,host=a usage=0.4")?;
/// wal.replay(SequenceNumber::new(0), |seq, payload| {
///     println!("{seq}: {} bytes", payload.len());
///     Ok(())
/// })?;
/// ```
pub struct WalManager {
    config: WalConfig,
    provider: Arc<dyn StorageProvider>,
    dir: Option<WalDir>,
    inner: Mutex<WalInner>,
    filter: Mutex<Option<ScalableBloomFilter>>,
    stats: Arc<WalStats>,
}

impl WalManager {
    /// Opens the WAL in `config.root` on the local file system.
    ///
    /// Takes the directory lock, discovers segments, repairs the tail of the
    /// last one, opens it for writing and loads the filter checkpoint if
    /// deduplication is configured.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalLocked`] if another process has the directory,
    /// [`CoreError::InvalidArgument`] for a bad configuration, and storage or
    /// codec errors from recovery.
    pub fn open(config: WalConfig) -> CoreResult<Self> {
        config.validate()?;
        let dir = WalDir::open(&config.root, config.create_if_missing)?;
        Self::open_inner(config, Arc::new(FileProvider), Some(dir))
    }

    /// Opens the WAL through `provider` without a directory lock.
    ///
    /// Filter checkpoints need a real directory and are unavailable here.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus locking.
    pub fn open_with_provider(
        config: WalConfig,
        provider: Arc<dyn StorageProvider>,
    ) -> CoreResult<Self> {
        config.validate()?;
        Self::open_inner(config, provider, None)
    }

    fn open_inner(
        config: WalConfig,
        provider: Arc<dyn StorageProvider>,
        dir: Option<WalDir>,
    ) -> CoreResult<Self> {
        let stats = Arc::new(WalStats::new());
        let mut store = SegmentStore::open(Arc::clone(&provider), &config.root, config.durability)?;

        store.open_initial_segment()?;
        if let Some((index, log)) = store.active_pair_mut() {
            let repair = repair_tail(&mut **index, &mut **log)?;
            if repair.repaired() {
                stats.record_tail_repair();
                tracing::warn!(
                    entries = repair.entries,
                    index_bytes = repair.index_bytes_dropped,
                    log_bytes = repair.log_bytes_dropped,
                    "repaired WAL tail"
                );
            }
        }

        let last_seq = last_written_seq(provider.as_ref(), store.segments())?;

        let filter = match config.dedup {
            Some(filter_config) => Some(load_filter(dir.as_ref(), filter_config)?),
            None => None,
        };

        tracing::info!(
            root = %config.root.display(),
            segments = store.segments().len(),
            last_seq = ?last_seq.map(SequenceNumber::as_u64),
            dedup = filter.is_some(),
            "opened WAL"
        );

        Ok(Self {
            config,
            provider,
            dir,
            inner: Mutex::new(WalInner { store, last_seq }),
            filter: Mutex::new(filter),
            stats,
        })
    }

    /// Appends an entry.
    ///
    /// Starts a new segment at `seq` when there is none yet or the active log
    /// has reached `max_segment_size`, rotating to it first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SequenceOutOfOrder`] unless `seq` exceeds the last
    /// appended sequence number, and rotation or storage errors otherwise.
    pub fn append(&self, seq: SequenceNumber, payload: &[u8]) -> CoreResult<IndexRecord> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(last) = inner.last_seq {
            if seq <= last {
                return Err(CoreError::SequenceOutOfOrder { seq, last });
            }
        }

        let result = self
            .position_for(&mut inner.store, seq)
            .and_then(|()| inner.store.write_entry(seq, payload))
            .and_then(|record| {
                if self.config.sync_on_append {
                    inner.store.sync()?;
                    self.stats.record_sync();
                }
                Ok(record)
            });

        match result {
            Ok(record) => {
                inner.last_seq = Some(seq);
                self.stats.record_append(payload.len() as u64);
                Ok(record)
            }
            Err(e) => {
                self.stats.record_error();
                Err(e)
            }
        }
    }

    /// Points the store at the segment that should receive `seq`.
    fn position_for(&self, store: &mut SegmentStore, seq: SequenceNumber) -> CoreResult<()> {
        let Some(cursor) = store.write_cursor() else {
            if store.segments().is_empty() {
                return self.start_segment(store, seq);
            }
            store.rotate_to(seq)?;
            self.stats.record_rotation();
            return Ok(());
        };

        let segments = store.segments();
        let first = segments
            .get(cursor)
            .map(|s| s.first_seq())
            .ok_or_else(|| CoreError::invalid_operation("write cursor out of range"))?;
        let in_range = seq >= first && segments.next_first_seq(cursor).is_none_or(|n| seq < n);

        if !in_range {
            // Only after a crash left an empty segment past the last entry.
            store.rotate_to(seq)?;
            self.stats.record_rotation();
        }

        let Some(active) = store.active_segment().map(|s| s.first_seq()) else {
            return Ok(());
        };
        let is_last = store.write_cursor() == store.segments().len().checked_sub(1);
        let log_size = store.active_log_size()?.unwrap_or(0);
        if is_last && log_size >= self.config.max_segment_size && seq > active {
            self.start_segment(store, seq)?;
        }
        Ok(())
    }

    fn start_segment(&self, store: &mut SegmentStore, seq: SequenceNumber) -> CoreResult<()> {
        store.create_segment(seq)?;
        self.stats.record_segment_created();
        store.rotate_to(seq)?;
        self.stats.record_rotation();

        if self.config.durability.fsyncs() {
            if let Some(dir) = &self.dir {
                dir.sync_directory()?;
            }
        }
        Ok(())
    }

    /// Returns the payload of the entry with exactly `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but cannot be read or verified.
    pub fn read(&self, seq: SequenceNumber) -> CoreResult<Option<Vec<u8>>> {
        let segments = self.segments_snapshot();
        let Some(position) = segments.locate(seq) else {
            return Ok(None);
        };
        let Some(info) = segments.get(position) else {
            return Ok(None);
        };

        let reader = SegmentReader::open(self.provider.as_ref(), info)?;
        let found = reader.find(seq)?.map(|record| record.payload);
        if let Some(payload) = &found {
            self.stats.record_read(payload.len() as u64);
        }
        Ok(found)
    }

    /// Streams entries with `seq >= from` in order.
    #[must_use]
    pub fn iter_from(&self, from: SequenceNumber) -> WalIterator {
        WalIterator::new(Arc::clone(&self.provider), &self.segments_snapshot(), from)
    }

    /// Hands every entry with `seq >= from` to `apply`, in order.
    ///
    /// Returns the number of entries applied.
    ///
    /// # Errors
    ///
    /// Stops at the first read, checksum or callback error and returns it.
    pub fn replay<F>(&self, from: SequenceNumber, mut apply: F) -> CoreResult<u64>
    where
        F: FnMut(SequenceNumber, &[u8]) -> CoreResult<()>,
    {
        let mut applied = 0;
        for entry in self.iter_from(from) {
            let entry = entry?;
            apply(entry.seq, &entry.payload)?;
            self.stats.record_replayed();
            applied += 1;
        }
        Ok(applied)
    }

    /// Decides whether an entry seen during replay should be applied.
    ///
    /// The key is `seq` (little-endian) followed by the payload. A key the
    /// filter has never seen is inserted and applied; one it may have seen is
    /// skipped. Without deduplication every entry is applied.
    ///
    /// # Errors
    ///
    /// Returns the filter's error if the insert fails, e.g.
    /// [`CoreError::FilterCapacityExhausted`].
    pub fn replay_duplicate_check(
        &self,
        seq: SequenceNumber,
        payload: &[u8],
    ) -> CoreResult<ReplayDecision> {
        let mut guard = self.filter.lock();
        let Some(filter) = guard.as_mut() else {
            return Ok(ReplayDecision::Apply);
        };

        let key = dedup_key(seq, payload);
        match filter.may_contain(&key) {
            Membership::Contains => {
                self.stats.record_duplicate();
                Ok(ReplayDecision::Skip)
            }
            Membership::DefinitelyAbsent => {
                filter.insert(&key)?;
                Ok(ReplayDecision::Apply)
            }
        }
    }

    /// Replays entries with `seq >= from`, skipping those the duplicate
    /// check rejects.
    ///
    /// # Errors
    ///
    /// Same as [`replay`](Self::replay) plus filter errors.
    pub fn replay_dedup<F>(&self, from: SequenceNumber, mut apply: F) -> CoreResult<ReplaySummary>
    where
        F: FnMut(SequenceNumber, &[u8]) -> CoreResult<()>,
    {
        let mut summary = ReplaySummary::default();
        for entry in self.iter_from(from) {
            let entry = entry?;
            match self.replay_duplicate_check(entry.seq, &entry.payload)? {
                ReplayDecision::Apply => {
                    apply(entry.seq, &entry.payload)?;
                    self.stats.record_replayed();
                    summary.applied += 1;
                }
                ReplayDecision::Skip => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    /// Writes the duplicate filter to `<root>/FILTER`, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if deduplication is off or the
    /// WAL was opened without a directory, and I/O errors from the write.
    pub fn checkpoint_filter(&self) -> CoreResult<()> {
        let Some(dir) = &self.dir else {
            return Err(CoreError::invalid_operation(
                "filter checkpoints need a file-backed WAL",
            ));
        };

        let encoded = {
            let guard = self.filter.lock();
            let Some(filter) = guard.as_ref() else {
                return Err(CoreError::invalid_operation("deduplication is not enabled"));
            };
            codec::to_bytes(filter)
        };

        dir.save_filter(&encoded)?;
        self.stats.record_filter_checkpoint();
        Ok(())
    }

    /// Runs `f` against the duplicate filter, if deduplication is on.
    pub fn with_filter<R>(&self, f: impl FnOnce(Option<&ScalableBloomFilter>) -> R) -> R {
        f(self.filter.lock().as_ref())
    }

    /// Fsyncs the active log and index.
    ///
    /// # Errors
    ///
    /// Returns an error if either sync fails or the WAL is closed.
    pub fn sync(&self) -> CoreResult<()> {
        self.inner.lock().store.sync()?;
        self.stats.record_sync();
        Ok(())
    }

    /// Flushes and releases the active segment. Later writes fail with
    /// [`CoreError::WalClosed`].
    ///
    /// # Errors
    ///
    /// Returns the first error hit while closing the segment files.
    pub fn close(&self) -> CoreResult<()> {
        self.inner.lock().store.close()
    }

    /// First sequence number of the oldest segment.
    #[must_use]
    pub fn first_seq(&self) -> Option<SequenceNumber> {
        self.inner
            .lock()
            .store
            .segments()
            .get(0)
            .map(|s| s.first_seq())
    }

    /// Sequence number of the newest entry.
    #[must_use]
    pub fn last_seq(&self) -> Option<SequenceNumber> {
        self.inner.lock().last_seq
    }

    /// Number of segments on disk.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.lock().store.segments().len()
    }

    /// Snapshot of the WAL counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle onto the live counters, for the monitor hooks.
    #[must_use]
    pub fn stats_handle(&self) -> Arc<WalStats> {
        Arc::clone(&self.stats)
    }

    /// The configuration the WAL was opened with.
    #[must_use]
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    fn segments_snapshot(&self) -> SegmentSet {
        self.inner.lock().store.segments().clone()
    }
}

impl Drop for WalManager {
    fn drop(&mut self) {
        if let Err(e) = self.inner.get_mut().store.close() {
            tracing::warn!(error = %e, "closing WAL on drop failed");
        }
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("root", &self.config.root)
            .field("segments", &self.segment_count())
            .field("last_seq", &self.last_seq())
            .finish_non_exhaustive()
    }
}

/// Builds the duplicate-filter key for an entry.
#[must_use]
pub fn dedup_key(seq: SequenceNumber, payload: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + payload.len());
    key.extend_from_slice(&seq.as_u64().to_le_bytes());
    key.extend_from_slice(payload);
    key
}

fn last_written_seq(
    provider: &dyn StorageProvider,
    segments: &SegmentSet,
) -> CoreResult<Option<SequenceNumber>> {
    let infos: Vec<_> = segments.iter().collect();
    for info in infos.into_iter().rev() {
        if let Some(seq) = SegmentReader::open(provider, info)?.last_seq()? {
            return Ok(Some(seq));
        }
    }
    Ok(None)
}

fn load_filter(
    dir: Option<&WalDir>,
    config: crate::config::FilterConfig,
) -> CoreResult<ScalableBloomFilter> {
    if let Some(bytes) = dir.map(WalDir::load_filter).transpose()?.flatten() {
        let filter = codec::from_bytes(&bytes)?;
        tracing::debug!(
            sub_filters = filter.filter_count(),
            total_bits = filter.total_bits(),
            "loaded filter checkpoint"
        );
        return Ok(filter);
    }
    ScalableBloomFilter::new(config.expected_entries, config.error_rate)
}
