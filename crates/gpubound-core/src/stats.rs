// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Capture-wide distributional baselines used to judge whether a row is
//! unusual relative to the rest of its capture.

use crate::capture::{Capture, CounterRow};
use crate::catalog::MetricId;
use crate::resolve::ResolvedSchema;
use std::collections::BTreeMap;

/// Linear interpolation between closest ranks. Non-finite inputs are ignored;
/// `NaN` when nothing remains or `q` is outside `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if !q.is_finite() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    let mut sorted = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let frac = pos - lower as f64;
    match sorted.get(lower + 1) {
        Some(next) => sorted[lower] + frac * (next - sorted[lower]),
        None => sorted[lower],
    }
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Median and 90th percentile of one quantity over a capture.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Baseline {
    pub median: f64,
    pub p90: f64,
    pub samples: usize,
}

impl Baseline {
    pub const UNDEFINED: Baseline = Baseline {
        median: f64::NAN,
        p90: f64::NAN,
        samples: 0,
    };

    pub fn from_samples(values: &[f64]) -> Self {
        let mut sorted = values
            .iter()
            .copied()
            .filter(|value| value.is_finite())
            .collect::<Vec<_>>();
        if sorted.is_empty() {
            return Self::UNDEFINED;
        }
        sorted.sort_by(f64::total_cmp);
        Self {
            median: quantile_sorted(&sorted, 0.5),
            p90: quantile_sorted(&sorted, 0.9),
            samples: sorted.len(),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.samples > 0
    }
}

impl Default for Baseline {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// Quantities tracked across a capture.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaselineKey {
    GpuTime,
    SamplesPassed,
    RasterizedPrimitives,
    NsPerSample,
    NsPerPrimitive,
    InstPerSample,
    DramBandwidth,
    BytesPerInstruction,
    BackendWriteRate,
    BankConflictsPerWavefront,
}

impl BaselineKey {
    pub const ALL: [BaselineKey; 10] = [
        BaselineKey::GpuTime,
        BaselineKey::SamplesPassed,
        BaselineKey::RasterizedPrimitives,
        BaselineKey::NsPerSample,
        BaselineKey::NsPerPrimitive,
        BaselineKey::InstPerSample,
        BaselineKey::DramBandwidth,
        BaselineKey::BytesPerInstruction,
        BaselineKey::BackendWriteRate,
        BaselineKey::BankConflictsPerWavefront,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GpuTime => "gpu_time",
            Self::SamplesPassed => "samples_passed",
            Self::RasterizedPrimitives => "rasterized_primitives",
            Self::NsPerSample => "ns_per_sample",
            Self::NsPerPrimitive => "ns_per_primitive",
            Self::InstPerSample => "inst_per_sample",
            Self::DramBandwidth => "dram_bandwidth",
            Self::BytesPerInstruction => "bytes_per_instruction",
            Self::BackendWriteRate => "backend_write_rate",
            Self::BankConflictsPerWavefront => "bank_conflicts_per_wavefront",
        }
    }
}

/// `numerator / denominator` when both are finite, the denominator is
/// strictly positive and the quotient is finite; otherwise `NaN`.
pub fn positive_ratio(numerator: f64, denominator: f64) -> f64 {
    if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
        return f64::NAN;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() { ratio } else { f64::NAN }
}

/// Per-second rate of `amount` over `time_ns`.
pub fn rate_per_second(amount: f64, time_ns: f64) -> f64 {
    positive_ratio(amount * 1.0e9, time_ns)
}

/// Sum of two inputs, `NaN` unless both are finite.
pub fn strict_sum(a: f64, b: f64) -> f64 {
    if a.is_finite() && b.is_finite() {
        a + b
    } else {
        f64::NAN
    }
}

/// Per-row value of a baseline quantity; shared with derived metrics so the
/// current row and its baseline are computed identically.
pub fn row_quantity(schema: &ResolvedSchema, row: &CounterRow, key: BaselineKey) -> f64 {
    let value = |id: MetricId| schema.value(row, id);
    match key {
        BaselineKey::GpuTime => value(MetricId::GpuTime),
        BaselineKey::SamplesPassed => value(MetricId::SamplesPassed),
        BaselineKey::RasterizedPrimitives => value(MetricId::RasterizedPrimitives),
        BaselineKey::NsPerSample => {
            positive_ratio(value(MetricId::GpuTime), value(MetricId::SamplesPassed))
        }
        BaselineKey::NsPerPrimitive => positive_ratio(
            value(MetricId::GpuTime),
            value(MetricId::RasterizedPrimitives),
        ),
        BaselineKey::InstPerSample => {
            positive_ratio(value(MetricId::InstAll), value(MetricId::SamplesPassed))
        }
        BaselineKey::DramBandwidth => rate_per_second(
            strict_sum(value(MetricId::DramReadBytes), value(MetricId::DramWriteBytes)),
            value(MetricId::GpuTime),
        ),
        BaselineKey::BytesPerInstruction => positive_ratio(
            strict_sum(value(MetricId::DramReadBytes), value(MetricId::DramWriteBytes)),
            value(MetricId::InstAll),
        ),
        BaselineKey::BackendWriteRate => rate_per_second(
            strict_sum(
                value(MetricId::CropWriteSubpackets),
                value(MetricId::ZropWriteSubpackets),
            ),
            value(MetricId::GpuTime),
        ),
        BaselineKey::BankConflictsPerWavefront => positive_ratio(
            value(MetricId::SharedBankConflicts),
            value(MetricId::SharedWavefronts),
        ),
    }
}

/// Row eligibility for a key. Raw counts and ratios exclude idle rows so they
/// do not drag medians towards zero.
fn eligible(key: BaselineKey, value: f64) -> bool {
    if !value.is_finite() {
        return false;
    }
    match key {
        BaselineKey::GpuTime
        | BaselineKey::SamplesPassed
        | BaselineKey::RasterizedPrimitives
        | BaselineKey::NsPerSample
        | BaselineKey::NsPerPrimitive
        | BaselineKey::InstPerSample => value > 0.0,
        BaselineKey::DramBandwidth
        | BaselineKey::BytesPerInstruction
        | BaselineKey::BackendWriteRate
        | BaselineKey::BankConflictsPerWavefront => true,
    }
}

pub fn compute_baseline(capture: &Capture, schema: &ResolvedSchema, key: BaselineKey) -> Baseline {
    let values = capture
        .rows()
        .iter()
        .map(|row| row_quantity(schema, row, key))
        .filter(|value| eligible(key, *value))
        .collect::<Vec<_>>();
    Baseline::from_samples(&values)
}

/// Baselines for every tracked quantity of one capture.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureBaselines {
    baselines: BTreeMap<BaselineKey, Baseline>,
}

impl CaptureBaselines {
    pub fn compute(capture: &Capture, schema: &ResolvedSchema) -> Self {
        let baselines = BaselineKey::ALL
            .iter()
            .map(|key| (*key, compute_baseline(capture, schema, *key)))
            .collect::<BTreeMap<_, _>>();
        tracing::debug!(
            rows = capture.len(),
            defined = baselines.values().filter(|b| b.is_defined()).count(),
            "computed capture baselines"
        );
        Self { baselines }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (BaselineKey, Baseline)>) -> Self {
        Self {
            baselines: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, key: BaselineKey) -> Baseline {
        self.baselines
            .get(&key)
            .copied()
            .unwrap_or(Baseline::UNDEFINED)
    }

    pub fn median(&self, key: BaselineKey) -> f64 {
        self.get(key).median
    }

    pub fn p90(&self, key: BaselineKey) -> f64 {
        self.get(key).p90
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Baseline, BaselineKey, CaptureBaselines, median, positive_ratio, quantile,
    };
    use crate::capture::{Capture, CounterRow};
    use crate::catalog::MetricCatalog;
    use crate::resolve::ResolvedSchema;

    fn capture(rows: &[(f64, f64)]) -> (Capture, ResolvedSchema) {
        let headers = vec!["gpu__time_duration.sum".to_string(), "Samples Passed".to_string()];
        let rows = rows
            .iter()
            .map(|(t, s)| {
                CounterRow::from_pairs([("gpu__time_duration.sum", *t), ("Samples Passed", *s)])
            })
            .collect();
        let capture = Capture::new(headers, rows).expect("capture should build");
        let schema = ResolvedSchema::resolve(MetricCatalog::standard(), capture.headers());
        (capture, schema)
    }

    #[test]
    fn quantile_interpolates_between_closest_ranks() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert_eq!(median(&values), 2.5);
        assert!((quantile(&values, 0.9) - 3.7).abs() < 1e-12);
    }

    #[test]
    fn quantile_of_empty_or_all_nan_is_nan() {
        assert!(quantile(&[], 0.5).is_nan());
        assert!(quantile(&[f64::NAN, f64::INFINITY], 0.5).is_nan());
        assert!(quantile(&[1.0], 1.5).is_nan());
    }

    #[test]
    fn baseline_of_single_value_is_that_value() {
        let baseline = Baseline::from_samples(&[7.0]);
        assert_eq!(baseline.median, 7.0);
        assert_eq!(baseline.p90, 7.0);
        assert!(baseline.is_defined());
        assert!(!Baseline::from_samples(&[]).is_defined());
    }

    #[test]
    fn positive_ratio_rejects_zero_and_negative_denominators() {
        assert!(positive_ratio(1.0, 0.0).is_nan());
        assert!(positive_ratio(1.0, -2.0).is_nan());
        assert!(positive_ratio(f64::NAN, 2.0).is_nan());
        assert_eq!(positive_ratio(3.0, 2.0), 1.5);
    }

    #[test]
    fn idle_rows_and_zero_denominators_are_left_out_of_baselines() {
        let (capture, schema) = capture(&[(100.0, 10.0), (50.0, 0.0), (30.0, 3.0), (0.0, 5.0)]);
        let baselines = CaptureBaselines::compute(&capture, &schema);
        assert_eq!(baselines.median(BaselineKey::GpuTime), 50.0);
        assert_eq!(baselines.median(BaselineKey::NsPerSample), 10.0);
        assert_eq!(baselines.p90(BaselineKey::NsPerSample), 10.0);
    }

    #[test]
    fn capture_baselines_leave_unresolvable_quantities_undefined() {
        let (capture, schema) = capture(&[(100.0, 10.0), (300.0, 20.0)]);
        let baselines = CaptureBaselines::compute(&capture, &schema);
        assert_eq!(baselines.median(BaselineKey::GpuTime), 200.0);
        assert_eq!(baselines.median(BaselineKey::NsPerSample), 12.5);
        assert!(baselines.median(BaselineKey::DramBandwidth).is_nan());
        assert!(!baselines.get(BaselineKey::BankConflictsPerWavefront).is_defined());
    }
}
