//! Storage backend benchmarks for the access patterns the WAL uses.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use tidewal_bench::random_payload;
use tidewal_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// Benchmark appends on both backends.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_append");

    for size in [20, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("inmemory", size), size, |b, &size| {
            let mut backend = InMemoryBackend::new();
            let data = random_payload(size);
            b.iter(|| black_box(backend.append(black_box(&data)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("file", size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut backend = FileBackend::open(&temp_dir.path().join("bench.log")).unwrap();
            let data = random_payload(size);
            b.iter(|| black_box(backend.append(black_box(&data)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark fixed-width reads at scattered offsets, like index lookups.
fn bench_index_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_index_read");
    let record_count = 10_000u64;

    group.bench_function("file_20b_records", |b| {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = FileBackend::open(&temp_dir.path().join("bench.idx")).unwrap();
        let record = random_payload(20);
        for _ in 0..record_count {
            backend.append(&record).unwrap();
        }

        let mut idx = 0u64;
        b.iter(|| {
            let offset = ((idx * 7919) % record_count) * 20;
            idx += 1;
            black_box(backend.read_at(black_box(offset), 20).unwrap());
        });
    });

    group.finish();
}

/// Benchmark the sync that closes every rotated segment.
fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_sync");
    group.sample_size(20);

    let temp_dir = TempDir::new().unwrap();
    let mut backend = FileBackend::open(&temp_dir.path().join("bench.log")).unwrap();
    let data = random_payload(1024);

    group.bench_function("after_1kb_append", |b| {
        b.iter(|| {
            backend.append(&data).unwrap();
            backend.sync().unwrap();
        });
    });

    group.finish();
}

/// Benchmark cutting a torn tail, as open-time repair does.
fn bench_truncate(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend_truncate");

    group.bench_function("inmemory_drop_tail", |b| {
        let data = random_payload(4096);
        b.iter(|| {
            let mut backend = InMemoryBackend::with_data(data.clone());
            backend.truncate(black_box(4000)).unwrap();
            black_box(backend.size().unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_index_reads,
    bench_sync,
    bench_truncate
);
criterion_main!(benches);
