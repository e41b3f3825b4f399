//! Fixed-capacity bloom filter used as one generation of the growable filter.
//!
//! Binary format (little-endian):
//! ```text
//! [expected_entries: u64]
//! [error_rate: f64 bits]
//! [hash_count: u32]
//! [bit_count: u64]               // multiple of 64
//! [element_count: u64]
//! [words: u64 x bit_count / 64]
//! ```

use crate::error::{CoreError, CoreResult};
use tidewal_codec::{BinaryDecoder, BinaryEncoder};

const WORD_BITS: u64 = 64;

/// Upper bound on probes per key; anything larger is a corrupt header.
const MAX_HASH_COUNT: u32 = 64;

/// A bloom filter sized for a fixed number of entries at a target error rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter {
    expected_entries: u64,
    error_rate: f64,
    hash_count: u32,
    bit_count: u64,
    element_count: u64,
    words: Vec<u64>,
}

impl BloomFilter {
    /// Creates a filter for `expected_entries` keys at `error_rate`.
    ///
    /// Uses `bits = ceil(n * |ln p| / ln(2)^2)` and
    /// `hashes = ceil(ln(2) * bits / n)`; the bit count is rounded up to whole
    /// 64-bit words.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for a zero capacity, an error
    /// rate outside `(0, 1)` or a bit count that does not fit in memory, and
    /// [`CoreError::OutOfMemory`] if the bit array cannot be allocated.
    pub fn new(expected_entries: u64, error_rate: f64) -> CoreResult<Self> {
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

        let ln2 = std::f64::consts::LN_2;
        let entries = expected_entries as f64;
        let raw_bits = (entries * error_rate.ln().abs() / (ln2 * ln2)).ceil();
        let max_bits = (isize::MAX as u64 / 8) as f64;
        if !raw_bits.is_finite() || raw_bits > max_bits {
            return Err(CoreError::invalid_argument(format!(
                "{expected_entries} entries at {error_rate} need more bits than addressable"
            )));
        }

        let raw_bits = (raw_bits as u64).max(1);
        let hash_count = ((ln2 * raw_bits as f64 / entries).ceil() as u32).clamp(1, MAX_HASH_COUNT);
        let word_count = raw_bits.div_ceil(WORD_BITS) as usize;

        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|_| CoreError::OutOfMemory {
                requested_bytes: word_count.saturating_mul(8),
            })?;
        words.resize(word_count, 0);

        Ok(Self {
            expected_entries,
            error_rate,
            hash_count,
            bit_count: word_count as u64 * WORD_BITS,
            element_count: 0,
            words,
        })
    }

    /// Number of entries the filter was sized for.
    #[must_use]
    pub fn expected_entries(&self) -> u64 {
        self.expected_entries
    }

    /// Error rate the filter was sized for.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    /// Probes per key.
    #[must_use]
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Size of the bit array.
    #[must_use]
    pub fn bit_count(&self) -> u64 {
        self.bit_count
    }

    /// Insertions accepted so far.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// Whether the filter has accepted as many insertions as it was sized for.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.element_count >= self.expected_entries
    }

    #[inline]
    fn positions(&self, h1: u64, h2: u64) -> impl Iterator<Item = u64> {
        let bits = self.bit_count;
        (0..u64::from(self.hash_count)).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % bits)
    }

    /// Sets the bits for a precomputed hash pair.
    ///
    /// Every call counts toward [`BloomFilter::is_full`], including one whose
    /// bits were already set, so a generation fills after exactly
    /// `expected_entries` insertions.
    pub fn put_hash(&mut self, h1: u64, h2: u64) {
        let positions: Vec<u64> = self.positions(h1, h2).collect();
        for pos in positions {
            self.words[(pos / WORD_BITS) as usize] |= 1u64 << (pos % WORD_BITS);
        }
        self.element_count += 1;
    }

    /// Tests a precomputed hash pair.
    ///
    /// `false` means definitely absent; `true` means possibly present.
    #[must_use]
    pub fn may_contain_hash(&self, h1: u64, h2: u64) -> bool {
        self.positions(h1, h2)
            .all(|pos| self.words[(pos / WORD_BITS) as usize] & (1u64 << (pos % WORD_BITS)) != 0)
    }

    /// Appends the encoded filter to `enc`.
    pub fn encode(&self, enc: &mut BinaryEncoder) {
        enc.put_u64(self.expected_entries);
        enc.put_f64(self.error_rate);
        enc.put_u32(self.hash_count);
        enc.put_u64(self.bit_count);
        enc.put_u64(self.element_count);
        for &word in &self.words {
            enc.put_u64(word);
        }
    }

    /// Reads one encoded filter from `dec`.
    ///
    /// # Errors
    ///
    /// Returns a codec error on a short read and
    /// [`CoreError::MalformedFilter`] when a header field is out of range.
    pub fn decode(dec: &mut BinaryDecoder<'_>) -> CoreResult<Self> {
        let expected_entries = dec.read_u64()?;
        let error_rate = dec.read_f64()?;
        let hash_count = dec.read_u32()?;
        let bit_count = dec.read_u64()?;
        let element_count = dec.read_u64()?;

        if expected_entries < 1 {
            return Err(CoreError::malformed_filter("sub-filter sized for zero entries"));
        }
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(CoreError::malformed_filter(format!(
                "sub-filter error rate {error_rate} not in (0, 1)"
            )));
        }
        if hash_count == 0 || hash_count > MAX_HASH_COUNT {
            return Err(CoreError::malformed_filter(format!(
                "sub-filter hash count {hash_count} out of range"
            )));
        }
        if bit_count == 0 || bit_count % WORD_BITS != 0 {
            return Err(CoreError::malformed_filter(format!(
                "sub-filter bit count {bit_count} is not a positive multiple of 64"
            )));
        }

        // Check the payload is present before allocating for it.
        let word_count = bit_count / WORD_BITS;
        let remaining_words = (dec.remaining().len() / 8) as u64;
        if word_count > remaining_words {
            return Err(CoreError::malformed_filter(format!(
                "sub-filter declares {word_count} words, only {remaining_words} present"
            )));
        }

        let mut words = Vec::with_capacity(word_count as usize);
        for _ in 0..word_count {
            words.push(dec.read_u64()?);
        }

        Ok(Self {
            expected_entries,
            error_rate,
            hash_count,
            bit_count,
            element_count,
            words,
        })
    }
}
