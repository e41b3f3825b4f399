//! Growable bloom filter used to recognise entries already applied.
//!
//! A [`ScalableBloomFilter`] is a chain of fixed-size [`BloomFilter`]
//! generations. [`codec`] turns one into bytes and back.

mod bloom;
pub mod codec;
mod hash;
mod scalable;

pub use bloom::BloomFilter;
pub use hash::{djb2_mixed_64, fnv1a_64, HashFn, HashFunctions};
pub use scalable::{
    FilterState, InsertOutcome, Membership, ScalableBloomFilter, DEFAULT_GROWTH,
    DEFAULT_MAX_FILTERS, DEFAULT_TIGHTENING_RATIO,
};
