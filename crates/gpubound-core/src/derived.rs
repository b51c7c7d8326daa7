// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Row-local secondary quantities. Every undefined result is `NaN`; nothing in
//! this module substitutes zero for a missing input.

use crate::capture::CounterRow;
use crate::catalog::MetricId;
use crate::error::{BoundError, Result};
use crate::resolve::ResolvedSchema;
use crate::stats::{BaselineKey, CaptureBaselines, positive_ratio, row_quantity, strict_sum};

const DEFAULT_PERCENT_CUTOFF: f64 = 1.5;
const DEFAULT_STALL_CEILING: f64 = 9.99;
const DEFAULT_CACHE_HIT_CEILING: f64 = 1.2;
const DEFAULT_REGISTER_FRACTION_CEILING: f64 = 2.0;
const DEFAULT_STAGE_SHARE_FLOOR: f64 = 0.55;

pub fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Thresholds for percent-or-fraction normalization and stage detection.
///
/// The percent cutoff and plausibility ceilings are empirical and kept as
/// tunable data.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizationConfig {
    /// Values above this are read as percent and divided by 100.
    pub percent_cutoff: f64,
    pub stall_ceiling: f64,
    pub cache_hit_ceiling: f64,
    pub register_fraction_ceiling: f64,
    /// Winning instruction share below this reports a mixed workload.
    pub stage_share_floor: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            percent_cutoff: DEFAULT_PERCENT_CUTOFF,
            stall_ceiling: DEFAULT_STALL_CEILING,
            cache_hit_ceiling: DEFAULT_CACHE_HIT_CEILING,
            register_fraction_ceiling: DEFAULT_REGISTER_FRACTION_CEILING,
            stage_share_floor: DEFAULT_STAGE_SHARE_FLOOR,
        }
    }
}

impl NormalizationConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("percent_cutoff", self.percent_cutoff),
            ("stall_ceiling", self.stall_ceiling),
            ("cache_hit_ceiling", self.cache_hit_ceiling),
            ("register_fraction_ceiling", self.register_fraction_ceiling),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(BoundError::invalid_input(format!(
                    "normalization.{name} must be finite and > 0.0; got {value}"
                )));
            }
        }
        if !self.stage_share_floor.is_finite() || !(0.0..=1.0).contains(&self.stage_share_floor) {
            return Err(BoundError::invalid_input(format!(
                "normalization.stage_share_floor must be within [0.0, 1.0]; got {}",
                self.stage_share_floor
            )));
        }
        Ok(())
    }
}

/// Maps a value reported as either a `0..1` fraction or a `0..100` percent
/// onto `0..1`. Negative values, values above `ceiling`, and (optionally)
/// exact zero are undefined.
pub fn to_fraction(value: f64, percent_cutoff: f64, ceiling: f64, zero_is_undefined: bool) -> f64 {
    if !value.is_finite() {
        return f64::NAN;
    }
    let fraction = if value > percent_cutoff {
        value / 100.0
    } else {
        value
    };
    if (zero_is_undefined && fraction == 0.0) || fraction < 0.0 || fraction > ceiling {
        return f64::NAN;
    }
    fraction
}

/// Shader stage that executed most of a work item's instructions.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DominantStage {
    /// Vertex, tessellation and geometry stages combined.
    Vtg,
    Pixel,
    Compute,
    Mixed,
}

impl DominantStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vtg => "vtg",
            Self::Pixel => "pixel",
            Self::Compute => "compute",
            Self::Mixed => "mixed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Vtg => "vertex/tessellation/geometry",
            Self::Pixel => "pixel shader",
            Self::Compute => "compute shader",
            Self::Mixed => "mixed workload",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageShare {
    pub stage: DominantStage,
    /// Instruction share of the winning stage; `NaN` when decided by invocations.
    pub share: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Picks the largest of `(compute, pixel, vtg)`, preferring that order on ties.
fn largest_stage(compute: f64, pixel: f64, vtg: f64) -> (DominantStage, f64) {
    let mut best = (DominantStage::Compute, compute);
    for candidate in [(DominantStage::Pixel, pixel), (DominantStage::Vtg, vtg)] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best
}

/// Dominant stage from per-stage instruction counts, falling back to
/// invocation counts when no stage executed a counted instruction.
pub fn detect_stage(schema: &ResolvedSchema, row: &CounterRow, share_floor: f64) -> StageShare {
    let value = |id: MetricId| finite_or_zero(schema.value(row, id));
    let vtg = value(MetricId::InstVs)
        + value(MetricId::InstTcs)
        + value(MetricId::InstTes)
        + value(MetricId::InstGs);
    let pixel = value(MetricId::InstPs);
    let compute = value(MetricId::InstCs);
    let total = vtg + pixel + compute;

    if total > 0.0 {
        let (stage, share) = largest_stage(compute / total, pixel / total, vtg / total);
        let stage = if share < share_floor {
            DominantStage::Mixed
        } else {
            stage
        };
        return StageShare { stage, share };
    }

    let (stage, count) = largest_stage(
        value(MetricId::CsInvocations),
        value(MetricId::PsInvocations),
        value(MetricId::VsInvocations),
    );
    StageShare {
        stage: if count > 0.0 {
            stage
        } else {
            DominantStage::Mixed
        },
        share: f64::NAN,
    }
}

macro_rules! stall_reasons {
    ($($variant:ident => ($metric:ident, $key:literal, $label:literal, $ranked:literal)),+ $(,)?) => {
        /// Warp stall reason, in the order used to rank them.
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum StallReason {
            $($variant),+
        }

        impl StallReason {
            pub const ALL: &'static [StallReason] = &[$(StallReason::$variant),+];

            pub fn metric(self) -> MetricId {
                match self {
                    $(StallReason::$variant => MetricId::$metric),+
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(StallReason::$variant => $key),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $(StallReason::$variant => $label),+
                }
            }

            /// Whether the reason takes part in top-stall summaries.
            pub fn is_ranked(self) -> bool {
                match self {
                    $(StallReason::$variant => $ranked),+
                }
            }
        }
    };
}

stall_reasons! {
    LongScoreboard => (StallLongScoreboard, "long_scoreboard", "Long scoreboard (waiting on data)", true),
    LongScoreboardL1tex => (StallLongScoreboardL1tex, "long_scoreboard_l1tex", "Long scoreboard L1TEX", true),
    TexThrottle => (StallTexThrottle, "tex_throttle", "Texture throttle", true),
    MathThrottle => (StallMathThrottle, "math_throttle", "Math pipe throttle", true),
    LgThrottle => (StallLgThrottle, "lg_throttle", "LG throttle (LSU queue)", true),
    NotSelected => (StallNotSelected, "not_selected", "Not selected (low occupancy)", true),
    Branch => (StallBranch, "branch", "Branch resolving", true),
    Barrier => (StallBarrier, "barrier", "Barrier", true),
    Membar => (StallMembar, "membar", "Membar", true),
    NoInstruction => (StallNoInstruction, "no_instruction", "No instruction", true),
    Dispatch => (StallDispatch, "dispatch", "Dispatch stall", true),
    Wait => (StallWait, "wait", "Wait", true),
    ShortScoreboard => (StallShortScoreboard, "short_scoreboard", "Short scoreboard", true),
    Mio => (StallMio, "mio_throttle", "MIO throttle", true),
    Misc => (StallMisc, "misc", "Misc", true),
    Drain => (StallDrain, "drain", "Drain", true),
    Sleeping => (StallSleeping, "sleeping", "Sleeping", true),
    MioPipe => (StallMioPipe, "mio_throttle_pipe", "MIO throttle (MIO pipe)", false),
    Selected => (StallSelected, "selected", "Selected", false),
}

/// Normalized per-reason warp stall fractions for one row.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StallBreakdown {
    values: Vec<(StallReason, f64)>,
}

impl StallBreakdown {
    pub fn compute(schema: &ResolvedSchema, row: &CounterRow, config: &NormalizationConfig) -> Self {
        let values = StallReason::ALL
            .iter()
            .map(|reason| {
                let raw = schema.value(row, reason.metric());
                (
                    *reason,
                    to_fraction(raw, config.percent_cutoff, config.stall_ceiling, false),
                )
            })
            .collect();
        Self { values }
    }

    /// Breakdown with the given reasons set and every other reason undefined.
    pub fn from_values(values: impl IntoIterator<Item = (StallReason, f64)>) -> Self {
        let mut breakdown = Self {
            values: StallReason::ALL.iter().map(|r| (*r, f64::NAN)).collect(),
        };
        for (reason, value) in values {
            if let Some(slot) = breakdown.values.iter_mut().find(|(r, _)| *r == reason) {
                slot.1 = value;
            }
        }
        breakdown
    }

    /// Fraction for `reason`, `NaN` when unavailable.
    pub fn get(&self, reason: StallReason) -> f64 {
        self.values
            .iter()
            .find(|(r, _)| *r == reason)
            .map_or(f64::NAN, |(_, value)| *value)
    }

    /// Up to `n` defined ranked stalls, largest first; equal values keep
    /// declaration order.
    pub fn top(&self, n: usize) -> Vec<(StallReason, f64)> {
        let mut ranked = self
            .values
            .iter()
            .copied()
            .filter(|(reason, value)| reason.is_ranked() && value.is_finite())
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Current-row quantities relative to their capture baselines.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeMetrics {
    /// ns/sample over the median ns/sample.
    pub cost_per_sample: f64,
    pub cost_per_primitive: f64,
    pub inst_per_sample: f64,
    /// Samples passed over the p90 samples passed.
    pub sample_work: f64,
    pub primitive_work: f64,
    pub gpu_time: f64,
    pub dram_bandwidth: f64,
    pub bytes_per_instruction: f64,
    pub backend_write_rate: f64,
    pub bank_conflicts: f64,
}

impl RelativeMetrics {
    pub const UNDEFINED: RelativeMetrics = RelativeMetrics {
        cost_per_sample: f64::NAN,
        cost_per_primitive: f64::NAN,
        inst_per_sample: f64::NAN,
        sample_work: f64::NAN,
        primitive_work: f64::NAN,
        gpu_time: f64::NAN,
        dram_bandwidth: f64::NAN,
        bytes_per_instruction: f64::NAN,
        backend_write_rate: f64::NAN,
        bank_conflicts: f64::NAN,
    };
}

impl Default for RelativeMetrics {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// `current / reference`, undefined when the reference is undefined or zero.
pub fn relative_to(current: f64, reference: f64) -> f64 {
    if !current.is_finite() {
        return f64::NAN;
    }
    positive_ratio(current, reference)
}

/// Every derived quantity for one selected row.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedMetrics {
    pub time_ns: f64,
    pub active_ns: f64,
    pub active_ratio: f64,
    pub samples: f64,
    pub rasterized_primitives: f64,
    pub ps_invocations: f64,
    pub vs_invocations: f64,
    pub cs_invocations: f64,
    pub inst_all: f64,
    pub ns_per_sample: f64,
    pub ns_per_primitive: f64,
    pub inst_per_sample: f64,
    pub dram_read_bytes: f64,
    pub dram_write_bytes: f64,
    pub dram_bandwidth: f64,
    pub write_ratio: f64,
    pub bytes_per_instruction: f64,
    pub l1_hit: f64,
    pub l2_hit: f64,
    pub stalls: StallBreakdown,
    pub stage: StageShare,
    pub register_count: f64,
    pub register_fraction: f64,
    pub bank_conflicts_per_wavefront: f64,
    pub shared_bytes: f64,
    pub shared_bandwidth: f64,
    pub crop_write_subpackets: f64,
    pub zrop_write_subpackets: f64,
    pub backend_write_rate: f64,
    pub relative: RelativeMetrics,
}

/// Sum of the finite inputs, `NaN` when none is finite.
fn partial_sum(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(None, |acc: Option<f64>, value| Some(acc.unwrap_or(0.0) + value))
        .unwrap_or(f64::NAN)
}

impl DerivedMetrics {
    pub fn compute(
        schema: &ResolvedSchema,
        row: &CounterRow,
        baselines: &CaptureBaselines,
        config: &NormalizationConfig,
    ) -> Self {
        let value = |id: MetricId| schema.value(row, id);
        let quantity = |key: BaselineKey| row_quantity(schema, row, key);

        let time_ns = value(MetricId::GpuTime);
        let active_ns = value(MetricId::GpuActive);
        let active_ratio = if time_ns.is_finite() && time_ns > 0.0 && active_ns.is_finite() {
            clamp01(active_ns / time_ns)
        } else {
            f64::NAN
        };

        let dram_read_bytes = value(MetricId::DramReadBytes);
        let dram_write_bytes = value(MetricId::DramWriteBytes);
        let write_ratio = positive_ratio(
            dram_write_bytes,
            strict_sum(dram_read_bytes, dram_write_bytes),
        );

        let stage = detect_stage(schema, row, config.stage_share_floor);
        let (count_id, fraction_id) = match stage.stage {
            DominantStage::Pixel => (MetricId::RegsPsCount, MetricId::RegsPsPct),
            DominantStage::Compute => (MetricId::RegsCsCount, MetricId::RegsCsPct),
            DominantStage::Vtg => (MetricId::RegsVtgCount, MetricId::RegsVtgPct),
            DominantStage::Mixed => (MetricId::Regs3dCount, MetricId::Regs3dPct),
        };
        let register_fraction = to_fraction(
            value(fraction_id),
            config.percent_cutoff,
            config.register_fraction_ceiling,
            true,
        );

        let cache = |id: MetricId| {
            to_fraction(value(id), config.percent_cutoff, config.cache_hit_ceiling, true)
        };

        let shared_bytes = partial_sum(&[
            value(MetricId::SharedBytesRead),
            value(MetricId::SharedBytesAtomic),
        ]);
        let shared_bandwidth = positive_ratio(shared_bytes * 1.0e9, time_ns);

        let ns_per_sample = quantity(BaselineKey::NsPerSample);
        let ns_per_primitive = quantity(BaselineKey::NsPerPrimitive);
        let inst_per_sample = quantity(BaselineKey::InstPerSample);
        let dram_bandwidth = quantity(BaselineKey::DramBandwidth);
        let bytes_per_instruction = quantity(BaselineKey::BytesPerInstruction);
        let backend_write_rate = quantity(BaselineKey::BackendWriteRate);
        let bank_conflicts_per_wavefront = quantity(BaselineKey::BankConflictsPerWavefront);
        let samples = value(MetricId::SamplesPassed);
        let rasterized_primitives = value(MetricId::RasterizedPrimitives);

        let relative = RelativeMetrics {
            cost_per_sample: relative_to(ns_per_sample, baselines.median(BaselineKey::NsPerSample)),
            cost_per_primitive: relative_to(
                ns_per_primitive,
                baselines.median(BaselineKey::NsPerPrimitive),
            ),
            inst_per_sample: relative_to(
                inst_per_sample,
                baselines.median(BaselineKey::InstPerSample),
            ),
            sample_work: relative_to(samples, baselines.p90(BaselineKey::SamplesPassed)),
            primitive_work: relative_to(
                rasterized_primitives,
                baselines.p90(BaselineKey::RasterizedPrimitives),
            ),
            gpu_time: relative_to(time_ns, baselines.median(BaselineKey::GpuTime)),
            dram_bandwidth: relative_to(dram_bandwidth, baselines.p90(BaselineKey::DramBandwidth)),
            bytes_per_instruction: relative_to(
                bytes_per_instruction,
                baselines.p90(BaselineKey::BytesPerInstruction),
            ),
            backend_write_rate: relative_to(
                backend_write_rate,
                baselines.p90(BaselineKey::BackendWriteRate),
            ),
            bank_conflicts: relative_to(
                bank_conflicts_per_wavefront,
                baselines.p90(BaselineKey::BankConflictsPerWavefront),
            ),
        };

        Self {
            time_ns,
            active_ns,
            active_ratio,
            samples,
            rasterized_primitives,
            ps_invocations: value(MetricId::PsInvocations),
            vs_invocations: value(MetricId::VsInvocations),
            cs_invocations: value(MetricId::CsInvocations),
            inst_all: value(MetricId::InstAll),
            ns_per_sample,
            ns_per_primitive,
            inst_per_sample,
            dram_read_bytes,
            dram_write_bytes,
            dram_bandwidth,
            write_ratio,
            bytes_per_instruction,
            l1_hit: cache(MetricId::L1Hit),
            l2_hit: cache(MetricId::L2Hit),
            stalls: StallBreakdown::compute(schema, row, config),
            stage,
            register_count: value(count_id),
            register_fraction,
            bank_conflicts_per_wavefront,
            shared_bytes,
            shared_bandwidth,
            crop_write_subpackets: value(MetricId::CropWriteSubpackets),
            zrop_write_subpackets: value(MetricId::ZropWriteSubpackets),
            backend_write_rate,
            relative,
        }
    }

    /// Metrics with every quantity undefined; a starting point for synthetic rows.
    pub fn undefined() -> Self {
        Self {
            time_ns: f64::NAN,
            active_ns: f64::NAN,
            active_ratio: f64::NAN,
            samples: f64::NAN,
            rasterized_primitives: f64::NAN,
            ps_invocations: f64::NAN,
            vs_invocations: f64::NAN,
            cs_invocations: f64::NAN,
            inst_all: f64::NAN,
            ns_per_sample: f64::NAN,
            ns_per_primitive: f64::NAN,
            inst_per_sample: f64::NAN,
            dram_read_bytes: f64::NAN,
            dram_write_bytes: f64::NAN,
            dram_bandwidth: f64::NAN,
            write_ratio: f64::NAN,
            bytes_per_instruction: f64::NAN,
            l1_hit: f64::NAN,
            l2_hit: f64::NAN,
            stalls: StallBreakdown::from_values([]),
            stage: StageShare {
                stage: DominantStage::Mixed,
                share: f64::NAN,
            },
            register_count: f64::NAN,
            register_fraction: f64::NAN,
            bank_conflicts_per_wavefront: f64::NAN,
            shared_bytes: f64::NAN,
            shared_bandwidth: f64::NAN,
            crop_write_subpackets: f64::NAN,
            zrop_write_subpackets: f64::NAN,
            backend_write_rate: f64::NAN,
            relative: RelativeMetrics::UNDEFINED,
        }
    }

    /// Whether the primary time metric is present and positive.
    pub fn has_time(&self) -> bool {
        self.time_ns.is_finite() && self.time_ns > 0.0
    }

    pub fn cache_known(&self) -> bool {
        self.l1_hit.is_finite() || self.l2_hit.is_finite()
    }

    /// Any known cache hit rate below `threshold`.
    pub fn cache_poor(&self, threshold: f64) -> bool {
        [self.l1_hit, self.l2_hit]
            .iter()
            .any(|hit| hit.is_finite() && *hit < threshold)
    }

    pub fn dram_bytes(&self) -> f64 {
        strict_sum(self.dram_read_bytes, self.dram_write_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DerivedMetrics, DominantStage, NormalizationConfig, StallBreakdown, StallReason,
        detect_stage, relative_to, to_fraction,
    };
    use crate::capture::{Capture, CounterRow};
    use crate::catalog::MetricCatalog;
    use crate::resolve::ResolvedSchema;
    use crate::stats::CaptureBaselines;

    fn derive(pairs: &[(&str, f64)]) -> DerivedMetrics {
        let headers = pairs.iter().map(|(name, _)| (*name).to_string()).collect();
        let row = CounterRow::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)));
        let capture = Capture::new(headers, vec![row]).expect("capture should build");
        let schema = ResolvedSchema::resolve(MetricCatalog::standard(), capture.headers());
        let baselines = CaptureBaselines::compute(&capture, &schema);
        DerivedMetrics::compute(
            &schema,
            &capture.rows()[0],
            &baselines,
            &NormalizationConfig::default(),
        )
    }

    #[test]
    fn percent_and_fraction_normalize_to_same_value() {
        let config = NormalizationConfig::default();
        let a = to_fraction(45.0, config.percent_cutoff, config.cache_hit_ceiling, true);
        let b = to_fraction(0.45, config.percent_cutoff, config.cache_hit_ceiling, true);
        assert!((a - 0.45).abs() < 1e-12);
        assert_eq!(a, b);
    }

    #[test]
    fn implausible_negative_and_zero_values_are_undefined() {
        let config = NormalizationConfig::default();
        assert!(to_fraction(150.0, config.percent_cutoff, config.cache_hit_ceiling, true).is_nan());
        assert!(to_fraction(-0.2, config.percent_cutoff, config.stall_ceiling, false).is_nan());
        assert!(to_fraction(0.0, config.percent_cutoff, config.cache_hit_ceiling, true).is_nan());
        assert_eq!(to_fraction(0.0, config.percent_cutoff, config.stall_ceiling, false), 0.0);
        assert_eq!(to_fraction(1.5, config.percent_cutoff, config.stall_ceiling, false), 1.5);
    }

    #[test]
    fn percent_cutoff_is_exclusive() {
        let config = NormalizationConfig::default();
        let at = to_fraction(1.5, config.percent_cutoff, config.register_fraction_ceiling, true);
        let above = to_fraction(1.51, config.percent_cutoff, config.register_fraction_ceiling, true);
        assert_eq!(at, 1.5);
        assert!((above - 0.0151).abs() < 1e-12);

        // Fractions at or below 0.015 have no percent spelling above the cutoff.
        let small = to_fraction(1.2, config.percent_cutoff, config.stall_ceiling, false);
        assert_eq!(small, 1.2);
    }

    #[test]
    fn active_ratio_requires_positive_total_time() {
        let derived = derive(&[("gpu__time_duration.sum", 0.0), ("gpu__time_active.sum", 5.0)]);
        assert!(derived.active_ratio.is_nan());
        assert!(!derived.has_time());

        let derived = derive(&[("gpu__time_duration.sum", 100.0), ("gpu__time_active.sum", 50.0)]);
        assert_eq!(derived.active_ratio, 0.5);
    }

    #[test]
    fn zero_denominators_never_produce_zero() {
        let derived = derive(&[
            ("gpu__time_duration.sum", 0.0),
            ("Samples Passed", 0.0),
            ("Rasterized Primitives", 0.0),
            ("sm__inst_executed.sum", 0.0),
            ("dram__bytes_op_read.sum", 0.0),
            ("dram__bytes_op_write.sum", 0.0),
        ]);
        assert!(derived.ns_per_sample.is_nan());
        assert!(derived.ns_per_primitive.is_nan());
        assert!(derived.inst_per_sample.is_nan());
        assert!(derived.dram_bandwidth.is_nan());
        assert!(derived.write_ratio.is_nan());
        assert!(derived.bytes_per_instruction.is_nan());
    }

    #[test]
    fn write_ratio_and_bandwidth_follow_dram_traffic() {
        let derived = derive(&[
            ("gpu__time_duration.sum", 1.0e6),
            ("dram__bytes_op_read.sum", 300.0),
            ("dram__bytes_op_write.sum", 700.0),
        ]);
        assert!((derived.write_ratio - 0.7).abs() < 1e-12);
        assert!((derived.dram_bandwidth - 1.0e6).abs() < 1e-6);
    }

    #[test]
    fn single_row_capture_has_unit_relative_costs() {
        let derived = derive(&[
            ("gpu__time_duration.sum", 2000.0),
            ("Samples Passed", 400.0),
            ("Rasterized Primitives", 50.0),
            ("sm__inst_executed.sum", 8000.0),
        ]);
        assert_eq!(derived.relative.cost_per_sample, 1.0);
        assert_eq!(derived.relative.cost_per_primitive, 1.0);
        assert_eq!(derived.relative.inst_per_sample, 1.0);
        assert_eq!(derived.relative.sample_work, 1.0);
        assert_eq!(derived.relative.primitive_work, 1.0);
    }

    #[test]
    fn relative_to_undefined_or_zero_reference_is_undefined() {
        assert!(relative_to(2.0, f64::NAN).is_nan());
        assert!(relative_to(2.0, 0.0).is_nan());
        assert!(relative_to(f64::NAN, 2.0).is_nan());
        assert_eq!(relative_to(0.0, 2.0), 0.0);
    }

    #[test]
    fn stage_ties_prefer_compute_then_pixel() {
        let headers = [
            "smsp__inst_executed_shader_ps.sum",
            "smsp__inst_executed_shader_cs.sum",
        ];
        let schema = ResolvedSchema::resolve(MetricCatalog::standard(), &headers);
        let row = CounterRow::from_pairs([(headers[0], 100.0), (headers[1], 100.0)]);
        let stage = detect_stage(&schema, &row, 0.4);
        assert_eq!(stage.stage, DominantStage::Compute);
        assert_eq!(stage.share, 0.5);

        let stage = detect_stage(&schema, &row, 0.55);
        assert_eq!(stage.stage, DominantStage::Mixed);
    }

    #[test]
    fn stage_falls_back_to_invocations() {
        let derived = derive(&[("PS Invocations", 10.0), ("CS Invocations", 0.0)]);
        assert_eq!(derived.stage.stage, DominantStage::Pixel);
        assert!(derived.stage.share.is_nan());

        let derived = derive(&[("Samples Passed", 10.0)]);
        assert_eq!(derived.stage.stage, DominantStage::Mixed);
    }

    #[test]
    fn register_metrics_follow_dominant_stage() {
        let derived = derive(&[
            ("smsp__inst_executed_shader_ps.sum", 900.0),
            ("smsp__inst_executed_shader_vs.sum", 100.0),
            ("tpc__average_registers_per_thread_shader_ps.avg", 96.0),
            ("tpc__average_registers_per_thread_shader_ps.avg.pct", 75.0),
            ("tpc__average_registers_per_thread_shader_3d.avg", 32.0),
        ]);
        assert_eq!(derived.stage.stage, DominantStage::Pixel);
        assert_eq!(derived.register_count, 96.0);
        assert!((derived.register_fraction - 0.75).abs() < 1e-12);
    }

    #[test]
    fn top_stalls_rank_defined_values_in_declaration_order_on_ties() {
        let breakdown = StallBreakdown::from_values([
            (StallReason::Branch, 0.2),
            (StallReason::TexThrottle, 0.2),
            (StallReason::LongScoreboard, 0.5),
            (StallReason::Selected, 0.9),
        ]);
        let top = breakdown.top(3);
        assert_eq!(
            top,
            vec![
                (StallReason::LongScoreboard, 0.5),
                (StallReason::TexThrottle, 0.2),
                (StallReason::Branch, 0.2),
            ]
        );
        assert!(breakdown.get(StallReason::Wait).is_nan());
    }

    #[test]
    fn default_normalization_validates_and_rejects_bad_ceiling() {
        assert!(NormalizationConfig::default().validate().is_ok());
        let config = NormalizationConfig {
            cache_hit_ceiling: 0.0,
            ..NormalizationConfig::default()
        };
        let err = config.validate().expect_err("zero ceiling should fail");
        assert!(err.to_string().contains("cache_hit_ceiling"));
    }
}
