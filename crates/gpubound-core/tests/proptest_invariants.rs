// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gpubound_core::{
    Capture, CaptureBaselines, CounterRow, DerivedMetrics, MetricCatalog, MetricId,
    NormalizationConfig, ResolvedSchema, quantile, to_fraction,
};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const ABS_TOL: f64 = 1e-9;
const REL_TOL: f64 = 1e-9;
const MIN_PROPTEST_CASES: u32 = 256;

const HEADER_POOL: [&str; 10] = [
    "gpu__time_duration.sum",
    "gpu__time_duration.avg",
    "GPU Duration (ms)",
    "gpu__time_active.sum",
    "Samples Passed",
    "samples passed",
    "SAMPLES PASSED (count)",
    "dram__bytes_op_read.sum",
    "dram__bytes_op_write.avg",
    "lts__t_sector_hit_rate.avg.pct",
];

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn relative_close(actual: f64, expected: f64) -> bool {
    let diff = (actual - expected).abs();
    diff <= ABS_TOL || diff <= REL_TOL * (1.0 + expected.abs())
}

fn reference_median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn derive_single(headers: &[&str], values: &[f64]) -> DerivedMetrics {
    let row = CounterRow::from_pairs(headers.iter().copied().zip(values.iter().copied()));
    let capture = Capture::new(
        headers.iter().map(|name| (*name).to_string()).collect(),
        vec![row],
    )
    .expect("generated headers are unique");
    let schema = ResolvedSchema::resolve(MetricCatalog::standard(), capture.headers());
    let baselines = CaptureBaselines::compute(&capture, &schema);
    DerivedMetrics::compute(
        &schema,
        &capture.rows()[0],
        &baselines,
        &NormalizationConfig::default(),
    )
}

fn header_subset_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(HEADER_POOL.to_vec(), 1..=HEADER_POOL.len())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn quantile_endpoints_and_median_match_reference(
        values in proptest::collection::vec(-1.0e9f64..1.0e9, 1..64),
    ) {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(quantile(&values, 0.0), min);
        prop_assert_eq!(quantile(&values, 1.0), max);
        prop_assert!(relative_close(quantile(&values, 0.5), reference_median(&values)));
    }

    #[test]
    fn quantile_is_monotone_in_q(
        values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..32),
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(quantile(&values, lo) <= quantile(&values, hi) + ABS_TOL);
    }

    #[test]
    fn resolution_is_invariant_to_header_order(
        (headers, shuffled) in header_subset_strategy()
            .prop_flat_map(|headers| (Just(headers.clone()), Just(headers).prop_shuffle())),
    ) {
        let catalog = MetricCatalog::standard();
        let first = ResolvedSchema::resolve(catalog, &headers);
        let second = ResolvedSchema::resolve(catalog, &shuffled);
        let repeat = ResolvedSchema::resolve(catalog, &headers);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &repeat);
    }

    #[test]
    fn millisecond_and_nanosecond_captures_derive_identically(
        time_ms in 0.001f64..500.0,
        active_share in 0.0f64..1.0,
        read in 0.0f64..1.0e9,
        write in 0.0f64..1.0e9,
    ) {
        let time_ns = time_ms * 1.0e6;
        let active_ns = time_ns * active_share;
        let ns = derive_single(
            &["gpu__time_duration.sum", "gpu__time_active.sum", "dram__bytes_op_read.sum", "dram__bytes_op_write.sum"],
            &[time_ns, active_ns, read, write],
        );
        let ms = derive_single(
            &["GPU Duration (ms)", "gpu__time_active.sum", "dram__bytes_op_read.sum", "dram__bytes_op_write.sum"],
            &[time_ms, active_ns, read, write],
        );
        prop_assert!(relative_close(ms.time_ns, ns.time_ns));
        prop_assert!(relative_close(ms.active_ratio, ns.active_ratio));
        prop_assert!(relative_close(ms.dram_bandwidth, ns.dram_bandwidth));
    }

    #[test]
    fn percent_and_fraction_forms_agree(fraction in 0.02f64..1.0) {
        let config = NormalizationConfig::default();
        let from_fraction = to_fraction(fraction, config.percent_cutoff, config.cache_hit_ceiling, true);
        let from_percent = to_fraction(fraction * 100.0, config.percent_cutoff, config.cache_hit_ceiling, true);
        prop_assert!(relative_close(from_fraction, from_percent));
    }

    #[test]
    fn zero_denominators_are_undefined_not_zero(
        numerator in 0.0f64..1.0e9,
        include_denominator in any::<bool>(),
    ) {
        let (headers, values): (Vec<&str>, Vec<f64>) = if include_denominator {
            (
                vec!["gpu__time_duration.sum", "Samples Passed", "Rasterized Primitives", "sm__inst_executed.sum"],
                vec![numerator, 0.0, 0.0, 0.0],
            )
        } else {
            (vec!["gpu__time_duration.sum"], vec![numerator])
        };
        let derived = derive_single(&headers, &values);
        for value in [
            derived.ns_per_sample,
            derived.ns_per_primitive,
            derived.inst_per_sample,
            derived.bytes_per_instruction,
            derived.relative.cost_per_sample,
            derived.relative.sample_work,
        ] {
            prop_assert!(value.is_nan());
        }
        prop_assert!(ResolvedSchema::resolve(MetricCatalog::standard(), &headers).is_resolved(MetricId::GpuTime));
    }
}
