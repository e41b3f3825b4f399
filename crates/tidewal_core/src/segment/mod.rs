//! Segment files and rotation.
//!
//! A segment is a pair of files named after the first sequence number it
//! holds:
//!
//! ```text
//! <root>/00000000000000000100.idx   # fixed 20-byte records
//! <root>/00000000000000000100.log   # framed entries
//! ```
//!
//! ## Index Record Format
//!
//! ```text
//! | offset (8) | length (4) | seq (8) |
//! ```
//!
//! `offset` and `length` locate the framed entry in the log file.
//!
//! ## Rotation
//!
//! Exactly one segment is open for writing. Rotating releases its log, then
//! its index, and opens the pair of the last segment whose first sequence
//! number is at or before the target. A failure after a handle has been
//! released leaves the store [`StoreState::Torn`].

mod record;
mod rotator;
mod set;
mod store;

pub use record::IndexRecord;
pub use set::{
    index_file_name, log_file_name, parse_file_name, SegmentInfo, SegmentSet, INDEX_EXTENSION,
    LOG_EXTENSION,
};
pub use store::{SegmentStore, StoreState};
