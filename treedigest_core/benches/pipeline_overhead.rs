//! Pipeline overhead benchmarks
//!
//! Noop digests isolate the cost of the buffer ring and the worker protocol
//! from the cost of the hash functions themselves.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use treedigest_core::{BufferTransport, DigestConfig, DigestRegistry, end_workers, start_workers};

const FILE_SIZE: usize = 16 * 1024 * 1024;

fn write_test_file(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("bench.bin");
    let data: Vec<u8> = (0..FILE_SIZE).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn bench_config(algorithms: &[&str], max_buffers: usize, transport: BufferTransport) -> DigestConfig {
    DigestConfig {
        max_buffers,
        transport,
        ..DigestConfig::default()
    }
    .with_algorithms(algorithms.iter().copied())
}

/// Ring depth and transport with five noop workers
fn benchmark_ring_overhead(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let path = write_test_file(&temp_dir);
    let registry = DigestRegistry::builtin();
    let noops = ["noop32", "noop128", "noop160", "noop256", "noop512"];

    let mut group = c.benchmark_group("ring_overhead");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));
    group.sample_size(20);

    for transport in [BufferTransport::Shared, BufferTransport::Inline] {
        for max_buffers in [1, 2, 4, 8] {
            let cfg = bench_config(&noops, max_buffers, transport);
            let mut pool = start_workers(&cfg, &registry).unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("{transport:?}").to_lowercase(), max_buffers),
                &path,
                |b, path| {
                    b.iter(|| {
                        let digest = runtime.block_on(pool.digest_file(path)).unwrap();
                        black_box(digest);
                    })
                },
            );

            runtime.block_on(end_workers(pool)).unwrap();
        }
    }

    group.finish();
}

/// Real digests, one at a time versus all together
fn benchmark_real_digests(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let path = write_test_file(&temp_dir);
    let registry = DigestRegistry::builtin();

    let mut group = c.benchmark_group("real_digests");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));
    group.sample_size(10);

    let sets: [(&str, &[&str]); 3] = [
        ("crc32", &["crc32"]),
        ("sha256", &["sha256"]),
        ("md5+sha1+sha256", &["md5", "sha1", "sha256"]),
    ];

    for (label, algorithms) in sets {
        let cfg = bench_config(algorithms, 4, BufferTransport::Shared);
        let mut pool = start_workers(&cfg, &registry).unwrap();

        group.bench_with_input(BenchmarkId::new("pool", label), &path, |b, path| {
            b.iter(|| {
                let digest = runtime.block_on(pool.digest_file(path)).unwrap();
                black_box(digest);
            })
        });

        runtime.block_on(end_workers(pool)).unwrap();
    }

    group.finish();
}

criterion_group!(benches, benchmark_ring_overhead, benchmark_real_digests);
criterion_main!(benches);
