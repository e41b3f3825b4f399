//! The two hash functions shared by every sub-filter.
//!
//! Both are deterministic across processes and platforms, so a serialized
//! filter answers the same way after it is decoded elsewhere.

/// A hash function over raw key bytes.
pub type HashFn = fn(&[u8]) -> u64;

/// The pair of hash functions a filter probes with.
///
/// Never serialized: a decoded filter gets the process's pair re-attached.
#[derive(Debug, Clone, Copy)]
pub struct HashFunctions {
    /// Base position of every probe.
    pub first: HashFn,
    /// Stride between probes.
    pub second: HashFn,
}

impl Default for HashFunctions {
    fn default() -> Self {
        Self {
            first: fnv1a_64,
            second: djb2_mixed_64,
        }
    }
}

impl HashFunctions {
    /// Hashes `key` with both functions.
    #[inline]
    #[must_use]
    pub fn pair(&self, key: &[u8]) -> (u64, u64) {
        ((self.first)(key), (self.second)(key))
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
#[must_use]
pub fn fnv1a_64(key: &[u8]) -> u64 {
    key.iter().fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// 64-bit djb2 followed by the splitmix64 finalizer.
///
/// djb2 alone leaves the high bits poorly mixed for short keys; the
/// finalizer spreads them so the probe stride is not correlated with
/// [`fnv1a_64`].
#[must_use]
pub fn djb2_mixed_64(key: &[u8]) -> u64 {
    let hash = key.iter().fold(5381u64, |hash, &byte| {
        hash.wrapping_mul(33).wrapping_add(u64::from(byte))
    });
    mix64(hash)
}

#[inline]
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(fnv1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn hash_pair_is_stable_and_distinct() {
        let hashers = HashFunctions::default();
        let (a1, a2) = hashers.pair(b"meters.d1001");
        let (b1, b2) = hashers.pair(b"meters.d1001");
        assert_eq!((a1, a2), (b1, b2));
        assert_ne!(a1, a2);
        assert_ne!(hashers.pair(b"meters.d1002"), (a1, a2));
    }
}
