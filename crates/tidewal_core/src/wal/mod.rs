//! Write-Ahead Log (WAL) for ingest durability and crash recovery.
//!
//! Every write accepted by a vnode is appended here, keyed by a
//! caller-assigned sequence number, before it is applied. After a crash the
//! WAL is replayed from the last applied sequence number.
//!
//! ## Log Record Format
//!
//! ```text
//! | magic "TWAL" (4) | version (2) | seq (8) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Each log record has a 20-byte index record pointing at it; see
//! [`IndexRecord`](crate::segment::IndexRecord).
//!
//! ## Recovery Policy
//!
//! ### Repaired on open (treated as a clean end-of-log)
//!
//! - **Partial index record** at the end of the last segment
//! - **Index records pointing past the log**, or at a torn log record
//! - **Log bytes with no index record**
//!
//! Only the tail of the last segment is repaired; see [`repair_tail`].
//!
//! ### Fatal when read
//!
//! - **CRC mismatch**: `Err(ChecksumMismatch)`
//! - **Bad magic, unknown version or seq disagreeing with the index**:
//!   `Err(WalCorruption)`
//!
//! ## Deduplicating Replay
//!
//! With [`WalConfig::dedup`](crate::WalConfig::dedup) set, replay consults a
//! [`ScalableBloomFilter`](crate::ScalableBloomFilter) keyed by sequence
//! number and payload. Entries the filter may already contain are skipped,
//! so a false positive can drop an entry; size the filter accordingly.
//!
//! ## Invariants
//!
//! - Sequence numbers strictly increase across appends.
//! - The log record is written before its index record.
//! - An index record's `seq` matches the log record it points at.

mod manager;
mod reader;
mod record;
mod recovery;

pub use manager::{dedup_key, ReplayDecision, ReplaySummary, WalManager};
pub use reader::{SegmentReader, WalIterator};
pub use record::{compute_crc32, LogRecord, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION};
pub use recovery::{repair_tail, TailRepair};
