//! Growable bloom filter built from a chain of fixed-size generations.

use super::bloom::BloomFilter;
use super::hash::HashFunctions;
use crate::error::{CoreError, CoreResult};

/// Capacity multiplier applied to each new generation.
pub const DEFAULT_GROWTH: u32 = 2;

/// Error-rate multiplier applied to each new generation.
pub const DEFAULT_TIGHTENING_RATIO: f64 = 0.5;

/// Maximum number of generations before inserts start failing.
pub const DEFAULT_MAX_FILTERS: u32 = 4;

/// Answer of a membership query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The key may have been inserted.
    Contains,
    /// The key was never inserted.
    DefinitelyAbsent,
}

impl Membership {
    /// Returns true for [`Membership::Contains`].
    #[must_use]
    pub fn may_contain(self) -> bool {
        matches!(self, Self::Contains)
    }
}

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was added to the newest generation.
    Inserted,
    /// An older generation already reports the key; nothing was written.
    PresentInOlderGeneration,
}

/// Validity latch. Once `Invalid`, a filter never becomes `Valid` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Accepting inserts.
    Valid,
    /// Growth failed; inserts are refused.
    Invalid,
}

/// A bloom filter that grows by appending generations as they fill.
///
/// Each new generation holds `growth` times the entries of the previous one
/// at `tightening_ratio` times its error rate, which keeps the compound
/// false-positive rate bounded. Generations are never removed.
///
/// # Example
///
/// ```rust
/// use tidewal_core::filter::{Membership, ScalableBloomFilter};
///
/// let mut filter = ScalableBloomFilter::new(1000, 0.01).unwrap();
/// filter.insert(b"seq-42").unwrap();
/// assert_eq!(filter.may_contain(b"seq-42"), Membership::Contains);
/// ```
#[derive(Debug, Clone)]
pub struct ScalableBloomFilter {
    filters: Vec<BloomFilter>,
    growth: u32,
    tightening_ratio: f64,
    total_bits: u64,
    max_filters: u32,
    state: FilterState,
    hashers: HashFunctions,
}

impl ScalableBloomFilter {
    /// Creates a filter whose first generation holds `expected_entries` keys.
    ///
    /// The first generation is already tightened once, so it runs at
    /// `error_rate * 0.5`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `expected_entries` is zero or
    /// `error_rate` is not strictly between 0 and 1.
    pub fn new(expected_entries: u64, error_rate: f64) -> CoreResult<Self> {
        Self::with_hash_functions(expected_entries, error_rate, HashFunctions::default())
    }

    /// Creates a filter that probes with `hashers` instead of the default pair.
    ///
    /// # Errors
    ///
    /// Same as [`ScalableBloomFilter::new`].
    pub fn with_hash_functions(
        expected_entries: u64,
        error_rate: f64,
        hashers: HashFunctions,
    ) -> CoreResult<Self> {
        if expected_entries < 1 {
            return Err(CoreError::invalid_argument(
                "expected_entries must be at least 1",
            ));
        }
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(CoreError::invalid_argument(format!(
                "error_rate {error_rate} not in (0, 1)"
            )));
        }

        let first = BloomFilter::new(expected_entries, error_rate * DEFAULT_TIGHTENING_RATIO)?;
        let total_bits = first.bit_count();

        Ok(Self {
            filters: vec![first],
            growth: DEFAULT_GROWTH,
            tightening_ratio: DEFAULT_TIGHTENING_RATIO,
            total_bits,
            max_filters: DEFAULT_MAX_FILTERS,
            state: FilterState::Valid,
            hashers,
        })
    }

    /// Reassembles a filter from decoded parts.
    pub(crate) fn from_parts(
        filters: Vec<BloomFilter>,
        growth: u32,
        total_bits: u64,
        max_filters: u32,
        state: FilterState,
        hashers: HashFunctions,
    ) -> Self {
        Self {
            filters,
            growth,
            tightening_ratio: DEFAULT_TIGHTENING_RATIO,
            total_bits,
            max_filters,
            state,
            hashers,
        }
    }

    /// Inserts `key` unless an older generation already reports it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FilterInvalid`] once the filter has latched
    /// invalid, and [`CoreError::FilterCapacityExhausted`] on the insert that
    /// needs a generation beyond the cap (which also latches the filter).
    pub fn insert(&mut self, key: &[u8]) -> CoreResult<InsertOutcome> {
        self.ensure_valid()?;
        let (h1, h2) = self.hashers.pair(key);

        let older = &self.filters[..self.filters.len() - 1];
        if older.iter().rev().any(|f| f.may_contain_hash(h1, h2)) {
            return Ok(InsertOutcome::PresentInOlderGeneration);
        }

        self.put(h1, h2)?;
        Ok(InsertOutcome::Inserted)
    }

    /// Inserts `key` into the newest generation without consulting older ones.
    ///
    /// # Errors
    ///
    /// Same as [`ScalableBloomFilter::insert`].
    pub fn insert_unchecked(&mut self, key: &[u8]) -> CoreResult<()> {
        self.ensure_valid()?;
        let (h1, h2) = self.hashers.pair(key);
        self.put(h1, h2)
    }

    /// Tests whether `key` may have been inserted.
    ///
    /// An invalid filter answers [`Membership::DefinitelyAbsent`] for every key.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> Membership {
        if self.state == FilterState::Invalid {
            return Membership::DefinitelyAbsent;
        }
        let (h1, h2) = self.hashers.pair(key);
        if self.filters.iter().rev().any(|f| f.may_contain_hash(h1, h2)) {
            Membership::Contains
        } else {
            Membership::DefinitelyAbsent
        }
    }

    fn ensure_valid(&self) -> CoreResult<()> {
        match self.state {
            FilterState::Valid => Ok(()),
            FilterState::Invalid => Err(CoreError::FilterInvalid),
        }
    }

    fn put(&mut self, h1: u64, h2: u64) -> CoreResult<()> {
        if self.newest().is_full() {
            self.grow()?;
        }
        let count = self.filters.len();
        self.filters[count - 1].put_hash(h1, h2);
        Ok(())
    }

    fn grow(&mut self) -> CoreResult<()> {
        if self.filters.len() >= self.max_filters as usize {
            self.state = FilterState::Invalid;
            tracing::error!(
                max_filters = self.max_filters,
                "bloom filter capacity exhausted, latching invalid"
            );
            return Err(CoreError::FilterCapacityExhausted {
                max_filters: self.max_filters,
            });
        }

        let last = self.newest();
        let entries = last.expected_entries().saturating_mul(u64::from(self.growth));
        let rate = last.error_rate() * self.tightening_ratio;

        let next = match BloomFilter::new(entries, rate) {
            Ok(next) => next,
            Err(e) => {
                self.state = FilterState::Invalid;
                tracing::error!(error = %e, entries, rate, "bloom filter growth failed, latching invalid");
                return Err(e);
            }
        };

        self.total_bits = self.total_bits.saturating_add(next.bit_count());
        tracing::debug!(
            generation = self.filters.len(),
            entries,
            rate,
            total_bits = self.total_bits,
            "bloom filter grew"
        );
        self.filters.push(next);
        Ok(())
    }

    fn newest(&self) -> &BloomFilter {
        // Construction and decoding both guarantee at least one generation.
        &self.filters[self.filters.len() - 1]
    }

    /// Number of generations.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Generations, oldest first.
    #[must_use]
    pub fn filters(&self) -> &[BloomFilter] {
        &self.filters
    }

    /// Capacity multiplier between generations.
    #[must_use]
    pub fn growth(&self) -> u32 {
        self.growth
    }

    /// Error-rate multiplier between generations.
    #[must_use]
    pub fn tightening_ratio(&self) -> f64 {
        self.tightening_ratio
    }

    /// Bits across all generations.
    #[must_use]
    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }

    /// Generation cap.
    #[must_use]
    pub fn max_filters(&self) -> u32 {
        self.max_filters
    }

    /// Validity latch.
    #[must_use]
    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Whether inserts are still accepted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state == FilterState::Valid
    }

    /// Insertions counted across all generations.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        self.filters.iter().map(BloomFilter::element_count).sum()
    }

    /// The hash functions this filter probes with.
    #[must_use]
    pub fn hash_functions(&self) -> HashFunctions {
        self.hashers
    }
}
