// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gpubound_bench::synthetic_capture;
use gpubound_core::MetricCatalog;
use gpubound_doctor::{BoundClassifier, CaptureContext, ClassifierConfig};

const ROWS: usize = 10_000;

fn benchmark_classify(c: &mut Criterion) {
    let capture = synthetic_capture(ROWS, 0x5eed).expect("synthetic capture should build");
    let context = CaptureContext::build(&capture, MetricCatalog::standard());
    let classifier =
        BoundClassifier::new(ClassifierConfig::default()).expect("default config should be valid");

    let mut group = c.benchmark_group("classify");

    group.bench_function("single_row", |b| {
        let row = &capture.rows()[ROWS / 2];
        b.iter(|| classifier.classify(black_box(&context), black_box(row)))
    });

    group.bench_function("scan_1e4_rows", |b| {
        b.iter(|| {
            for row in capture.rows() {
                black_box(classifier.classify(&context, row));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_classify);
criterion_main!(benches);
