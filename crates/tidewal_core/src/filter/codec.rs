//! Binary serialization of [`ScalableBloomFilter`].
//!
//! ```text
//! [count: i32]
//! [sub-filter x count]           // see `bloom`
//! [growth: u32]
//! [total_bits: u64]
//! [max_filters: u32]
//! [state: i8]                    // 0 valid, -1 invalid
//! ```
//!
//! An absent filter is written as a bare zero count. Hash functions are not
//! stored; the decoder attaches whatever pair the caller supplies.

use super::bloom::BloomFilter;
use super::hash::HashFunctions;
use super::scalable::{FilterState, ScalableBloomFilter};
use crate::error::{CoreError, CoreResult};
use tidewal_codec::{BinaryDecoder, BinaryEncoder};

const STATE_VALID: i8 = 0;
const STATE_INVALID: i8 = -1;

/// Appends `filter` to `enc`.
pub fn encode(filter: &ScalableBloomFilter, enc: &mut BinaryEncoder) {
    // The generation cap is a u32 that never exceeds a handful in practice;
    // the count field is i32 on disk.
    enc.put_i32(filter.filter_count() as i32);
    for sub in filter.filters() {
        sub.encode(enc);
    }
    enc.put_u32(filter.growth());
    enc.put_u64(filter.total_bits());
    enc.put_u32(filter.max_filters());
    enc.put_i8(match filter.state() {
        FilterState::Valid => STATE_VALID,
        FilterState::Invalid => STATE_INVALID,
    });
}

/// Appends `filter`, or a zero count when there is none.
pub fn encode_optional(filter: Option<&ScalableBloomFilter>, enc: &mut BinaryEncoder) {
    match filter {
        Some(filter) => encode(filter, enc),
        None => enc.put_i32(0),
    }
}

/// Encodes `filter` into a fresh buffer.
#[must_use]
pub fn to_bytes(filter: &ScalableBloomFilter) -> Vec<u8> {
    let mut enc = BinaryEncoder::new();
    encode(filter, &mut enc);
    enc.into_bytes()
}

/// Reads a filter from `dec` with the default hash functions.
///
/// Bytes after the filter are left unread.
///
/// # Errors
///
/// Returns [`CoreError::Codec`] on a short read and
/// [`CoreError::MalformedFilter`] on a zero or negative count or any
/// inconsistent field.
pub fn decode(dec: &mut BinaryDecoder<'_>) -> CoreResult<ScalableBloomFilter> {
    decode_with(dec, HashFunctions::default())
}

/// Reads a filter from `dec`, attaching `hashers`.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_with(
    dec: &mut BinaryDecoder<'_>,
    hashers: HashFunctions,
) -> CoreResult<ScalableBloomFilter> {
    let count = dec.read_i32()?;
    if count <= 0 {
        return Err(CoreError::malformed_filter(format!(
            "sub-filter count {count} must be positive"
        )));
    }
    decode_body(dec, count as u32, hashers)
}

/// Reads a filter written by [`encode_optional`].
///
/// # Errors
///
/// Same as [`decode`], except that a zero count yields `Ok(None)`.
pub fn decode_optional(dec: &mut BinaryDecoder<'_>) -> CoreResult<Option<ScalableBloomFilter>> {
    let count = dec.read_i32()?;
    match count {
        0 => Ok(None),
        c if c < 0 => Err(CoreError::malformed_filter(format!(
            "sub-filter count {c} is negative"
        ))),
        c => decode_body(dec, c as u32, HashFunctions::default()).map(Some),
    }
}

/// Decodes a buffer holding exactly one filter.
///
/// # Errors
///
/// Same as [`decode`], plus [`CoreError::Codec`] if bytes remain.
pub fn from_bytes(bytes: &[u8]) -> CoreResult<ScalableBloomFilter> {
    let mut dec = BinaryDecoder::new(bytes);
    let filter = decode(&mut dec)?;
    dec.finish()?;
    Ok(filter)
}

fn decode_body(
    dec: &mut BinaryDecoder<'_>,
    count: u32,
    hashers: HashFunctions,
) -> CoreResult<ScalableBloomFilter> {
    // Each sub-filter checks its own payload length before allocating, so a
    // huge count fails on the first missing generation.
    let mut filters = Vec::new();
    for _ in 0..count {
        filters.push(BloomFilter::decode(dec)?);
    }

    let growth = dec.read_u32()?;
    let total_bits = dec.read_u64()?;
    let max_filters = dec.read_u32()?;
    let state = match dec.read_i8()? {
        STATE_VALID => FilterState::Valid,
        STATE_INVALID => FilterState::Invalid,
        other => {
            return Err(CoreError::malformed_filter(format!(
                "unknown filter state {other}"
            )))
        }
    };

    if growth < 1 {
        return Err(CoreError::malformed_filter("growth factor is zero"));
    }
    if count > max_filters {
        return Err(CoreError::malformed_filter(format!(
            "{count} sub-filters exceed cap {max_filters}"
        )));
    }
    let sum: u64 = filters.iter().map(BloomFilter::bit_count).sum();
    if sum != total_bits {
        return Err(CoreError::malformed_filter(format!(
            "total bits {total_bits} do not match sub-filters ({sum})"
        )));
    }

    Ok(ScalableBloomFilter::from_parts(
        filters,
        growth,
        total_bits,
        max_filters,
        state,
        hashers,
    ))
}
