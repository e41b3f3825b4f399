//! Benchmark utilities.

use rand::Rng;
use tidewal_core::SequenceNumber;

/// Generate a random payload of the specified size.
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate distinct filter keys shaped like line-protocol rows.
pub fn row_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("cpu,host=h{},region=r{} usage={i}", i % 97, i % 7).into_bytes())
        .collect()
}

/// Generate `count` WAL entries with consecutive sequence numbers from 1.
pub fn wal_entries(count: usize, payload_size: usize) -> Vec<(SequenceNumber, Vec<u8>)> {
    (1..=count as u64)
        .map(|n| (SequenceNumber::new(n), random_payload(payload_size)))
        .collect()
}
