// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gpubound_core::{BoundError, NormalizationConfig, clamp01};
use std::sync::OnceLock;

const DEFAULT_MIN_SCORE: f64 = 0.18;
const DEFAULT_FALLBACK_SCORE: f64 = 0.12;
const DEFAULT_CACHE_LOW: f64 = 0.60;
const DEFAULT_MAX_EVIDENCE: usize = 8;
const DEFAULT_MAX_REMEDIATION: usize = 6;
const DEFAULT_TOP_STALLS: usize = 3;

const BEST_WEIGHT: f64 = 0.85;
const COVERAGE_WEIGHT: f64 = 0.25;
const RUNNER_UP_WEIGHT: f64 = 0.35;
const RUNNER_UP_CAP: f64 = 0.25;
const MISSING_TIME_FACTOR: f64 = 0.5;

/// Clamped linear ramp: 0 at `low`, 1 at `high`. `high < low` descends.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ramp {
    pub low: f64,
    pub high: f64,
}

impl Ramp {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Ramp position of `signal`; undefined signals contribute zero.
    pub fn eval(&self, signal: f64) -> f64 {
        if !signal.is_finite() {
            return 0.0;
        }
        clamp01((signal - self.low) / (self.high - self.low))
    }

    fn validate(&self, name: &str) -> Result<(), BoundError> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(BoundError::invalid_input(format!(
                "{name} ramp endpoints must be finite; got low={}, high={}",
                self.low, self.high
            )));
        }
        if self.low == self.high {
            return Err(BoundError::invalid_input(format!(
                "{name} ramp endpoints must differ; got low=high={}",
                self.low
            )));
        }
        Ok(())
    }
}

/// Weighted auxiliary ramp added on top of a hypothesis's primary signal.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boost {
    pub weight: f64,
    pub ramp: Ramp,
}

impl Boost {
    pub const fn new(weight: f64, low: f64, high: f64) -> Self {
        Self {
            weight,
            ramp: Ramp::new(low, high),
        }
    }

    pub fn eval(&self, signal: f64) -> f64 {
        self.weight * self.ramp.eval(signal)
    }

    fn validate(&self, name: &str) -> Result<(), BoundError> {
        validate_weight(name, self.weight)?;
        self.ramp.validate(name)
    }
}

fn validate_weight(name: &str, weight: f64) -> Result<(), BoundError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(BoundError::invalid_input(format!(
            "{name} must be finite and >= 0.0; got {weight}"
        )));
    }
    Ok(())
}

macro_rules! config_section {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$field_meta:meta])* $field:ident : $ty:ty = $default:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
        #[derive(Clone, Copy, Debug, PartialEq)]
        pub struct $name {
            $($(#[$field_meta])* pub $field: $ty),+
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default),+
                }
            }
        }
    };
}

config_section! {
    /// Underutilized GPU: the ramp descends as the active share falls.
    IdleConfig {
        active_ratio: Ramp = Ramp::new(0.80, 0.45),
    }
}

config_section! {
    TextureConfig {
        tex_stall: Ramp = Ramp::new(0.12, 0.47),
        l1tex_boost: Boost = Boost::new(0.25, 0.10, 0.40),
        poor_cache_bonus: f64 = 0.10,
        vtg_factor: f64 = 0.75,
    }
}

config_section! {
    MemoryLatencyConfig {
        long_stall: Ramp = Ramp::new(0.18, 0.56),
        poor_cache_bonus: f64 = 0.15,
        bandwidth_boost: Boost = Boost::new(0.20, 0.85, 1.20),
        bytes_per_instruction_boost: Boost = Boost::new(0.20, 0.85, 1.20),
        l1tex_boost: Boost = Boost::new(0.10, 0.10, 0.40),
    }
}

config_section! {
    LoadStoreConfig {
        lg_stall: Ramp = Ramp::new(0.10, 0.40),
        bytes_per_instruction_boost: Boost = Boost::new(0.15, 0.85, 1.20),
    }
}

config_section! {
    AluConfig {
        math_stall: Ramp = Ramp::new(0.10, 0.40),
        /// Long-scoreboard stalls below this mean memory is not the limiter.
        low_latency_below: f64 = 0.12,
        low_latency_bonus: f64 = 0.10,
        healthy_cache_bonus: f64 = 0.05,
    }
}

config_section! {
    OccupancyConfig {
        not_selected_stall: Ramp = Ramp::new(0.18, 0.53),
        register_fraction_boost: Boost = Boost::new(0.25, 0.60, 0.95),
        register_count_boost: Boost = Boost::new(0.15, 80.0, 160.0),
    }
}

config_section! {
    BranchConfig {
        stall: Ramp = Ramp::new(0.06, 0.26),
    }
}

config_section! {
    BarrierConfig {
        stall: Ramp = Ramp::new(0.08, 0.33),
        /// Applied outside compute work, where barriers are less common.
        non_compute_factor: f64 = 0.85,
    }
}

config_section! {
    AtomicsConfig {
        stall: Ramp = Ramp::new(0.06, 0.31),
    }
}

config_section! {
    InstructionFetchConfig {
        stall: Ramp = Ramp::new(0.08, 0.33),
    }
}

config_section! {
    SharedMemoryConfig {
        conflicts_per_wavefront: Ramp = Ramp::new(0.30, 0.75),
        short_scoreboard_boost: Boost = Boost::new(0.15, 0.10, 0.35),
        relative_boost: Boost = Boost::new(0.10, 1.0, 1.8),
    }
}

config_section! {
    BackendConfig {
        write_rate: Boost = Boost::new(0.65, 0.85, 1.25),
        write_share: Boost = Boost::new(0.35, 0.50, 0.90),
        non_pixel_factor: f64 = 0.75,
        /// Without a subpacket baseline, DRAM write share must exceed this.
        fallback_write_share_min: f64 = 0.60,
        fallback_base: f64 = 0.45,
        fallback_boost: Boost = Boost::new(0.35, 0.60, 0.95),
    }
}

config_section! {
    /// Relative per-unit cost or work against the capture baseline.
    StageCostConfig {
        signal: Ramp = Ramp::new(1.5, 3.0),
        off_stage_factor: f64 = 0.5,
    }
}

config_section! {
    ConfidenceConfig {
        best_weight: f64 = BEST_WEIGHT,
        coverage_weight: f64 = COVERAGE_WEIGHT,
        runner_up_weight: f64 = RUNNER_UP_WEIGHT,
        runner_up_cap: f64 = RUNNER_UP_CAP,
        missing_time_factor: f64 = MISSING_TIME_FACTOR,
    }
}

/// Every tunable threshold of the classifier, as data.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierConfig {
    /// Candidates scoring at or below this are dropped.
    pub min_score: f64,
    pub fallback_score: f64,
    /// Hit rates below this count as poor caching.
    pub cache_low: f64,
    pub max_evidence: usize,
    pub max_remediation: usize,
    pub top_stalls: usize,
    pub confidence: ConfidenceConfig,
    pub normalization: NormalizationConfig,
    pub idle: IdleConfig,
    pub texture: TextureConfig,
    pub memory_latency: MemoryLatencyConfig,
    pub load_store: LoadStoreConfig,
    pub alu: AluConfig,
    pub occupancy: OccupancyConfig,
    pub branch: BranchConfig,
    pub barrier: BarrierConfig,
    pub atomics: AtomicsConfig,
    pub instruction_fetch: InstructionFetchConfig,
    pub shared_memory: SharedMemoryConfig,
    pub backend: BackendConfig,
    pub vertex_cost: StageCostConfig,
    pub pixel_throughput: StageCostConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            fallback_score: DEFAULT_FALLBACK_SCORE,
            cache_low: DEFAULT_CACHE_LOW,
            max_evidence: DEFAULT_MAX_EVIDENCE,
            max_remediation: DEFAULT_MAX_REMEDIATION,
            top_stalls: DEFAULT_TOP_STALLS,
            confidence: ConfidenceConfig::default(),
            normalization: NormalizationConfig::default(),
            idle: IdleConfig::default(),
            texture: TextureConfig::default(),
            memory_latency: MemoryLatencyConfig::default(),
            load_store: LoadStoreConfig::default(),
            alu: AluConfig::default(),
            occupancy: OccupancyConfig::default(),
            branch: BranchConfig::default(),
            barrier: BarrierConfig::default(),
            atomics: AtomicsConfig::default(),
            instruction_fetch: InstructionFetchConfig::default(),
            shared_memory: SharedMemoryConfig::default(),
            backend: BackendConfig::default(),
            vertex_cost: StageCostConfig::default(),
            pixel_throughput: StageCostConfig::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), BoundError> {
        if !self.min_score.is_finite() || !(0.0..1.0).contains(&self.min_score) {
            return Err(BoundError::invalid_input(format!(
                "min_score must be within [0.0, 1.0); got {}",
                self.min_score
            )));
        }
        if !self.fallback_score.is_finite() || !(0.0..=1.0).contains(&self.fallback_score) {
            return Err(BoundError::invalid_input(format!(
                "fallback_score must be within [0.0, 1.0]; got {}",
                self.fallback_score
            )));
        }
        if !self.cache_low.is_finite() || !(0.0..=1.0).contains(&self.cache_low) {
            return Err(BoundError::invalid_input(format!(
                "cache_low must be within [0.0, 1.0]; got {}",
                self.cache_low
            )));
        }
        if self.max_evidence == 0 || self.max_remediation == 0 {
            return Err(BoundError::invalid_input(
                "max_evidence and max_remediation must be >= 1",
            ));
        }
        self.normalization.validate()?;

        let c = &self.confidence;
        for (name, weight) in [
            ("confidence.best_weight", c.best_weight),
            ("confidence.coverage_weight", c.coverage_weight),
            ("confidence.runner_up_weight", c.runner_up_weight),
            ("confidence.runner_up_cap", c.runner_up_cap),
            ("confidence.missing_time_factor", c.missing_time_factor),
            ("texture.poor_cache_bonus", self.texture.poor_cache_bonus),
            ("texture.vtg_factor", self.texture.vtg_factor),
            ("memory_latency.poor_cache_bonus", self.memory_latency.poor_cache_bonus),
            ("alu.low_latency_bonus", self.alu.low_latency_bonus),
            ("alu.healthy_cache_bonus", self.alu.healthy_cache_bonus),
            ("barrier.non_compute_factor", self.barrier.non_compute_factor),
            ("backend.non_pixel_factor", self.backend.non_pixel_factor),
            ("backend.fallback_base", self.backend.fallback_base),
            ("vertex_cost.off_stage_factor", self.vertex_cost.off_stage_factor),
            ("pixel_throughput.off_stage_factor", self.pixel_throughput.off_stage_factor),
        ] {
            validate_weight(name, weight)?;
        }
        if !self.alu.low_latency_below.is_finite() {
            return Err(BoundError::invalid_input(format!(
                "alu.low_latency_below must be finite; got {}",
                self.alu.low_latency_below
            )));
        }
        if !self.backend.fallback_write_share_min.is_finite() {
            return Err(BoundError::invalid_input(format!(
                "backend.fallback_write_share_min must be finite; got {}",
                self.backend.fallback_write_share_min
            )));
        }

        for (name, ramp) in [
            ("idle.active_ratio", self.idle.active_ratio),
            ("texture.tex_stall", self.texture.tex_stall),
            ("memory_latency.long_stall", self.memory_latency.long_stall),
            ("load_store.lg_stall", self.load_store.lg_stall),
            ("alu.math_stall", self.alu.math_stall),
            ("occupancy.not_selected_stall", self.occupancy.not_selected_stall),
            ("branch.stall", self.branch.stall),
            ("barrier.stall", self.barrier.stall),
            ("atomics.stall", self.atomics.stall),
            ("instruction_fetch.stall", self.instruction_fetch.stall),
            ("shared_memory.conflicts_per_wavefront", self.shared_memory.conflicts_per_wavefront),
            ("vertex_cost.signal", self.vertex_cost.signal),
            ("pixel_throughput.signal", self.pixel_throughput.signal),
        ] {
            ramp.validate(name)?;
        }

        for (name, boost) in [
            ("texture.l1tex_boost", self.texture.l1tex_boost),
            ("memory_latency.bandwidth_boost", self.memory_latency.bandwidth_boost),
            (
                "memory_latency.bytes_per_instruction_boost",
                self.memory_latency.bytes_per_instruction_boost,
            ),
            ("memory_latency.l1tex_boost", self.memory_latency.l1tex_boost),
            (
                "load_store.bytes_per_instruction_boost",
                self.load_store.bytes_per_instruction_boost,
            ),
            ("occupancy.register_fraction_boost", self.occupancy.register_fraction_boost),
            ("occupancy.register_count_boost", self.occupancy.register_count_boost),
            ("shared_memory.short_scoreboard_boost", self.shared_memory.short_scoreboard_boost),
            ("shared_memory.relative_boost", self.shared_memory.relative_boost),
            ("backend.write_rate", self.backend.write_rate),
            ("backend.write_share", self.backend.write_share),
            ("backend.fallback_boost", self.backend.fallback_boost),
        ] {
            boost.validate(name)?;
        }

        Ok(())
    }
}

/// Documented confidence formula used by the classifier with default weights.
pub fn confidence_formula() -> &'static str {
    static FORMULA: OnceLock<String> = OnceLock::new();
    FORMULA.get_or_init(|| {
        format!(
            "confidence = clamp01(best * {BEST_WEIGHT:.2} + coverage * {COVERAGE_WEIGHT:.2} - min({RUNNER_UP_CAP:.2}, runner_up * {RUNNER_UP_WEIGHT:.2})), multiplied by {MISSING_TIME_FACTOR:.1} when gpu time is unresolved or non-positive"
        )
    })
}
