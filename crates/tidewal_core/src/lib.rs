//! # tidewal Core
//!
//! Write-ahead log for a time-series storage node.
//!
//! This crate provides:
//! - A segmented WAL: index/log file pairs named by their first sequence
//!   number, with size-based roll-over and crash-tail repair
//! - Rotation of the write segment to the one covering a sequence number
//! - A growable bloom filter and its binary checkpoint format, used to skip
//!   entries already applied during replay
//! - Statistics and monitoring hooks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tidewal_core::{FilterConfig, SequenceNumber, WalConfig, WalManager};
//!
//! let config = WalConfig::new("/var/lib/tidewal/vnode2/wal")
//!     .dedup(FilterConfig::new(100_000, 0.01));
//! let wal = WalManager::open(config)?;
//!
//! wal.append(SequenceNumber::new(1), b"cpu,host=a usage=0.4")?;
//! let summary = wal.replay_dedup(SequenceNumber::new(0), |seq, payload| {
//!     apply(seq, payload)
//! })?;
//! wal.checkpoint_filter()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
pub mod filter;
pub mod monitor;
pub mod segment;
mod stats;
mod types;
pub mod wal;

pub use config::{FilterConfig, WalConfig};
pub use dir::WalDir;
pub use error::{CoreError, CoreResult};
pub use filter::{FilterState, InsertOutcome, Membership, ScalableBloomFilter};
pub use monitor::{MonitorConfig, MonitorHooks, MonitorReport, ResourceProbe};
pub use segment::{IndexRecord, SegmentStore};
pub use stats::{StatsSnapshot, WalStats};
pub use types::{Durability, SequenceNumber};
pub use wal::{ReplayDecision, ReplaySummary, WalIterator, WalManager};
