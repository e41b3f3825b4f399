//! WAL statistics.
//!
//! Counters are read by the monitor hooks and by callers that want to see
//! how much work the WAL is doing.
//!
//! # Usage
//!
//! ```rust,ignore
//! let wal = WalManager::open(WalConfig::new("/var/lib/tidewal/vnode2/wal"))?;
//! wal.append(SequenceNumber::new(1), b"row")?;
//!
//! let stats = wal.stats();
//! println!("Appends: {}", stats.appends);
//! println!("Rotations: {}", stats.rotations);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live WAL counters.
///
/// All counters are atomic and can be read while operations are in progress.
/// Values only ever increase.
#[derive(Debug, Default)]
pub struct WalStats {
    /// Entries appended.
    appends: AtomicU64,
    /// Payload bytes appended.
    bytes_appended: AtomicU64,
    /// Point reads by sequence number.
    reads: AtomicU64,
    /// Payload bytes returned by point reads.
    bytes_read: AtomicU64,
    /// Entries handed to a replay callback.
    entries_replayed: AtomicU64,
    /// Entries a deduplicating replay skipped.
    duplicates_skipped: AtomicU64,
    /// Segments created.
    segments_created: AtomicU64,
    /// Write-segment switches.
    rotations: AtomicU64,
    /// Explicit or per-append syncs.
    syncs: AtomicU64,
    /// Filter checkpoints written.
    filter_checkpoints: AtomicU64,
    /// Tails truncated during open.
    tail_repairs: AtomicU64,
    /// Failed appends.
    errors: AtomicU64,
}

impl WalStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, bytes: u64) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_replayed(&self) {
        self.entries_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_created(&self) {
        self.segments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sync(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filter_checkpoint(&self) {
        self.filter_checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tail_repair(&self) {
        self.tail_repairs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of appended entries.
    pub fn appends(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    /// Returns the number of payload bytes appended.
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended.load(Ordering::Relaxed)
    }

    /// Returns the number of rotations.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Returns the number of failed appends.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appends: self.appends(),
            bytes_appended: self.bytes_appended(),
            reads: self.reads.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            entries_replayed: self.entries_replayed.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            segments_created: self.segments_created.load(Ordering::Relaxed),
            rotations: self.rotations(),
            syncs: self.syncs.load(Ordering::Relaxed),
            filter_checkpoints: self.filter_checkpoints.load(Ordering::Relaxed),
            tail_repairs: self.tail_repairs.load(Ordering::Relaxed),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`WalStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Entries appended.
    pub appends: u64,
    /// Payload bytes appended.
    pub bytes_appended: u64,
    /// Point reads by sequence number.
    pub reads: u64,
    /// Payload bytes returned by point reads.
    pub bytes_read: u64,
    /// Entries handed to a replay callback.
    pub entries_replayed: u64,
    /// Entries a deduplicating replay skipped.
    pub duplicates_skipped: u64,
    /// Segments created.
    pub segments_created: u64,
    /// Write-segment switches.
    pub rotations: u64,
    /// Explicit or per-append syncs.
    pub syncs: u64,
    /// Filter checkpoints written.
    pub filter_checkpoints: u64,
    /// Tails truncated during open.
    pub tail_repairs: u64,
    /// Failed appends.
    pub errors: u64,
}
