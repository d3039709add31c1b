//! Benchmarks for synchronized collection writes, notification fan-out, and
//! mirror replay.
//!
//! Run with: cargo bench -p syncol-collections -- collection

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use syncol_collections::SyncCollection;

// ---------------------------------------------------------------------------
// 1. Add throughput with a growing number of handlers
// ---------------------------------------------------------------------------

fn bench_add_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/add_notify");
    let batch = 1_000u64;
    group.throughput(Throughput::Elements(batch));

    for handlers in [0usize, 1, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(handlers), &handlers, |b, &n| {
            b.iter(|| {
                let collection: SyncCollection<u64> = SyncCollection::new();
                let hits = Arc::new(AtomicU64::new(0));
                let _listeners: Vec<_> = (0..n)
                    .map(|_| {
                        let hits = Arc::clone(&hits);
                        collection.on_collection_changed(move |_| {
                            hits.fetch_add(1, Ordering::Relaxed);
                        })
                    })
                    .collect();
                for i in 0..batch {
                    let _ = collection.add(black_box(i));
                }
                black_box(hits.load(Ordering::Relaxed))
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Mirror fan-out: one source, N mapped mirrors
// ---------------------------------------------------------------------------

fn bench_mirror_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/mirror_fanout");
    let batch = 500u64;
    group.throughput(Throughput::Elements(batch));

    for mirrors in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(mirrors), &mirrors, |b, &n| {
            b.iter(|| {
                let source: SyncCollection<u64> = SyncCollection::new();
                let derived: Vec<_> = (0..n)
                    .filter_map(|k| source.mirror_map(move |v| v.wrapping_mul(k as u64 + 1)).ok())
                    .collect();
                for i in 0..batch {
                    let _ = source.add(black_box(i));
                }
                black_box(derived.iter().map(SyncCollection::count).sum::<usize>())
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Mirror construction over an existing source
// ---------------------------------------------------------------------------

fn bench_mirror_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/mirror_build");

    for len in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(len));
        let source: SyncCollection<u64> = (0..len).collect();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let mirror = source.mirror_map(|v| v + 1).ok();
                black_box(mirror.map(|m| m.count()))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_add_notify,
    bench_mirror_fanout,
    bench_mirror_build
);
criterion_main!(benches);
