// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gpubound_bench::synthetic_capture;
use gpubound_core::{CaptureBaselines, MetricCatalog, ResolvedSchema};

fn benchmark_baselines(c: &mut Criterion) {
    let mut group = c.benchmark_group("baselines");

    for rows in [1_000usize, 10_000, 100_000] {
        let capture = synthetic_capture(rows, 0xfeed_f00d_dead_beef).expect("synthetic capture should build");
        let schema = ResolvedSchema::resolve(MetricCatalog::standard(), capture.headers());

        group.bench_with_input(BenchmarkId::new("compute", rows), &capture, |b, capture| {
            b.iter(|| CaptureBaselines::compute(black_box(capture), black_box(&schema)))
        });
    }

    let capture = synthetic_capture(16, 1).expect("synthetic capture should build");
    group.bench_function("resolve_schema", |b| {
        b.iter(|| ResolvedSchema::resolve(MetricCatalog::standard(), black_box(capture.headers())))
    });

    group.finish();
}

criterion_group!(benches, benchmark_baselines);
criterion_main!(benches);
