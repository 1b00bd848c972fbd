//! Ingestion encoder benchmarks.
//!
//! Measures the client-side cost of turning a chunk into a request body, which
//! is included in every ingestion sample.

use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tsbench_adapters::encode;
use tsbench_core::{Chunk, Event};

fn chunk(size: usize) -> Chunk {
    let events = (0..size)
        .map(|i| Event {
            user_id: format!("user-{}", i % 500),
            timestamp: DateTime::from_timestamp(1_700_000_000 + i as i64, 0).unwrap(),
            rssi: -30.0 - (i % 70) as f64,
            ssid: format!("ssid {}", i % 40),
        })
        .collect();
    Chunk::new(0, events)
}

fn bench_encoders(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [1_000, 10_000] {
        let data = chunk(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("copy_csv", size), &data, |b, data| {
            b.iter(|| black_box(encode::copy_csv(data)));
        });

        group.bench_with_input(BenchmarkId::new("line_protocol", size), &data, |b, data| {
            b.iter(|| black_box(encode::line_protocol(data)));
        });

        group.bench_with_input(BenchmarkId::new("json_each_row", size), &data, |b, data| {
            b.iter(|| black_box(encode::json_each_row(data, 0).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encoders);
criterion_main!(benches);
