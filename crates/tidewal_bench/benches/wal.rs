//! WAL append and replay benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tempfile::TempDir;
use tidewal_bench::wal_entries;
use tidewal_core::{Durability, FilterConfig, SequenceNumber, WalConfig, WalManager};
use tidewal_storage::InMemoryProvider;

fn memory_wal(config: WalConfig) -> WalManager {
    WalManager::open_with_provider(config, Arc::new(InMemoryProvider::new())).unwrap()
}

/// Benchmark appends to an in-memory WAL.
fn bench_append_inmemory(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append_inmemory");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let wal = memory_wal(WalConfig::new("/bench/wal"));
            let payload = tidewal_bench::random_payload(size);
            let mut seq = 0u64;

            b.iter(|| {
                seq += 1;
                black_box(wal.append(SequenceNumber::new(seq), black_box(&payload)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark appends to a file-backed WAL, without fsync.
fn bench_append_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append_file");
    group.sample_size(50);

    for size in [256, 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let wal = WalManager::open(
                WalConfig::new(temp_dir.path()).durability(Durability::SkipFsync),
            )
            .unwrap();
            let payload = tidewal_bench::random_payload(size);
            let mut seq = 0u64;

            b.iter(|| {
                seq += 1;
                black_box(wal.append(SequenceNumber::new(seq), black_box(&payload)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark appends that roll over into a new segment every few entries.
fn bench_append_rotating(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append_rotating");
    group.sample_size(20);

    group.bench_function("inmemory_1000x256_4kb_segments", |b| {
        let entries = wal_entries(1_000, 256);

        b.iter(|| {
            let wal = memory_wal(WalConfig::new("/bench/wal").max_segment_size(4096));
            for (seq, payload) in &entries {
                wal.append(*seq, black_box(payload)).unwrap();
            }
            black_box(wal.segment_count());
        });
    });

    group.finish();
}

/// Benchmark full replay, plain and deduplicating.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_replay");
    group.sample_size(20);

    let entries = wal_entries(10_000, 128);
    group.throughput(Throughput::Elements(entries.len() as u64));

    let plain = memory_wal(WalConfig::new("/bench/wal").max_segment_size(256 * 1024));
    for (seq, payload) in &entries {
        plain.append(*seq, payload).unwrap();
    }

    group.bench_function("plain_10000x128", |b| {
        b.iter(|| {
            let applied = plain
                .replay(SequenceNumber::new(0), |seq, payload| {
                    black_box((seq, payload));
                    Ok(())
                })
                .unwrap();
            black_box(applied);
        });
    });

    group.bench_function("dedup_10000x128", |b| {
        b.iter(|| {
            let wal = memory_wal(
                WalConfig::new("/bench/wal")
                    .max_segment_size(256 * 1024)
                    .dedup(FilterConfig::new(10_000, 0.01)),
            );
            for (seq, payload) in &entries {
                wal.append(*seq, payload).unwrap();
            }
            let summary = wal
                .replay_dedup(SequenceNumber::new(0), |_, payload| {
                    black_box(payload);
                    Ok(())
                })
                .unwrap();
            black_box(summary);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append_inmemory,
    bench_append_file,
    bench_append_rotating,
    bench_replay
);
criterion_main!(benches);
