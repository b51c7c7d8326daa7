// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Stall-first shader view: names the dominant warp stall of the selected
//! event and attaches targeted advice.

use crate::cache::BaselineCache;
use crate::panel::{DiagnosticPanel, PanelDescriptor, PanelRequest, select_row};
use crate::result::Diagnosis;
use gpubound_core::{
    BoundError, CaptureBaselines, CounterRow, DerivedMetrics, MetricCatalog, MetricId,
    NormalizationConfig, ResolvedSchema, StallReason, clamp01, to_fraction,
};

pub const SHADER_XRAY_DESCRIPTOR: PanelDescriptor = PanelDescriptor {
    id: "shader-xray",
    name: "ShaderXray",
    description: "Stall-based shader bottleneck analysis.",
    order: 2,
};

/// Counters the view expects; absent ones are reported, not fatal.
const EXPECTED: &[MetricId] = &[
    MetricId::GpuTime,
    MetricId::GpuActive,
    MetricId::SamplesPassed,
    MetricId::PsInvocations,
    MetricId::CsInvocations,
    MetricId::DramReadBytes,
    MetricId::DramWriteBytes,
    MetricId::L1Hit,
    MetricId::L2Hit,
    MetricId::InstAll,
    MetricId::Regs3dPct,
    MetricId::RegsPsPct,
    MetricId::RegsVtgPct,
    MetricId::StallLongScoreboard,
    MetricId::StallShortScoreboard,
    MetricId::StallTexThrottle,
    MetricId::StallMathThrottle,
];

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XrayConfig {
    /// Length of the ranked stall list.
    pub top_stalls: usize,
    /// A stall must exceed this fraction of warp time to be called dominant.
    pub dominant_floor: f64,
    /// Stall fraction at which confidence saturates.
    pub full_confidence: f64,
    pub low_cache_hit: f64,
    pub high_register_fraction: f64,
    pub normalization: NormalizationConfig,
}

impl Default for XrayConfig {
    fn default() -> Self {
        Self {
            top_stalls: 6,
            dominant_floor: 0.05,
            full_confidence: 0.5,
            low_cache_hit: 0.6,
            high_register_fraction: 0.8,
            normalization: NormalizationConfig::default(),
        }
    }
}

impl XrayConfig {
    pub fn validate(&self) -> Result<(), BoundError> {
        if self.top_stalls == 0 {
            return Err(BoundError::invalid_input("xray.top_stalls must be >= 1"));
        }
        let fractions = [
            ("dominant_floor", self.dominant_floor),
            ("low_cache_hit", self.low_cache_hit),
            ("high_register_fraction", self.high_register_fraction),
        ];
        for (name, value) in fractions {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(BoundError::invalid_input(format!(
                    "xray.{name} must be within [0.0, 1.0]; got {value}"
                )));
            }
        }
        if !self.full_confidence.is_finite() || self.full_confidence <= 0.0 {
            return Err(BoundError::invalid_input(format!(
                "xray.full_confidence must be finite and > 0.0; got {}",
                self.full_confidence
            )));
        }
        self.normalization.validate()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StallShare {
    pub reason: StallReason,
    pub label: &'static str,
    pub fraction: f64,
}

/// Headline quantities shown next to the stall ranking.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XrayMetrics {
    pub time_ns: f64,
    pub active_ns: f64,
    pub samples: f64,
    /// Compute invocations for pure compute work, pixel invocations otherwise.
    pub invocations: f64,
    pub l1_hit: f64,
    pub l2_hit: f64,
    pub ns_per_sample: f64,
    pub inst_per_sample: f64,
    pub dram_bytes: f64,
    pub dram_bandwidth: f64,
    pub registers_used: f64,
    pub registers_vtg: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StallReport {
    /// Dominant stall label, or "Balanced" when no stall stands out.
    pub title: String,
    pub dominant: Option<StallReason>,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub tips: Vec<String>,
    pub top_stalls: Vec<StallShare>,
    pub metrics: XrayMetrics,
    pub unresolved: Vec<MetricId>,
}

struct StallGuidance {
    why: &'static str,
    fixes: &'static [&'static str],
}

fn guidance(reason: StallReason) -> StallGuidance {
    let (why, fixes): (&'static str, &'static [&'static str]) = match reason {
        StallReason::LongScoreboard | StallReason::LongScoreboardL1tex => (
            "Waiting for a high-latency operation (DRAM, texture).",
            &[
                "Minimize dependent texture fetches.",
                "Improve texture cache locality.",
                "Check for low L1/L2 cache hit rates.",
                "Reduce register pressure to hide latency.",
            ],
        ),
        StallReason::ShortScoreboard => (
            "Waiting for a short-latency operation (L1, shared memory, MIO).",
            &[
                "Reduce read-after-write dependencies.",
                "Optimize shared memory access patterns (bank conflicts).",
            ],
        ),
        StallReason::TexThrottle => (
            "Texture units are fully saturated.",
            &[
                "Reduce the number of texture samples.",
                "Use simpler filtering (bilinear).",
                "Use smaller texture formats.",
            ],
        ),
        StallReason::MathThrottle => (
            "ALU pipes are fully saturated.",
            &[
                "Replace expensive math with approximations.",
                "Move invariant math to the vertex shader.",
                "Use half precision (FP16) where possible.",
            ],
        ),
        StallReason::LgThrottle => (
            "The local/global memory queue is full.",
            &[
                "Coalesce global loads and stores.",
                "Use wider, fewer memory instructions.",
            ],
        ),
        StallReason::Branch => (
            "Stalled waiting for branch reconvergence.",
            &[
                "Reduce dynamic branching.",
                "Group threads by condition.",
                "Use branchless logic (step, lerp).",
            ],
        ),
        StallReason::Barrier => (
            "Waiting at a synchronization barrier.",
            &[
                "Reduce the frequency of barriers.",
                "Balance work between threads in a group.",
            ],
        ),
        StallReason::NotSelected => (
            "Warp ready but not selected; often an occupancy limit.",
            &[
                "Reduce register pressure (high registers mean fewer active warps).",
                "Reduce shared memory usage.",
            ],
        ),
        StallReason::Mio | StallReason::MioPipe => (
            "The memory I/O pipe is saturated.",
            &[
                "Reduce global memory stores.",
                "Avoid heavy use of atomics.",
                "Simplify attribute interpolation.",
            ],
        ),
        StallReason::Membar => (
            "Waiting on a memory fence.",
            &[
                "Relax memory ordering constraints.",
                "Remove redundant fences.",
            ],
        ),
        StallReason::NoInstruction => (
            "No instruction available; instruction cache misses or branch targets.",
            &[
                "Reduce shader code size and unrolling.",
                "Avoid large uber-shaders in hot draws.",
            ],
        ),
        StallReason::Dispatch | StallReason::Wait | StallReason::Drain => (
            "Fixed-latency pipeline dependency or dispatch delay.",
            &["Increase independent work between dependent instructions."],
        ),
        StallReason::Sleeping => (
            "Warps are sleeping or yielded.",
            &["Check for explicit sleeps or spin-wait loops."],
        ),
        StallReason::Misc | StallReason::Selected => (
            "Miscellaneous hardware stalls.",
            &["Profile with an instruction-level view for detail."],
        ),
    };
    StallGuidance { why, fixes }
}

fn percent(fraction: f64) -> String {
    if fraction.is_finite() {
        format!("{:.1}%", fraction * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn max_defined(a: f64, b: f64) -> f64 {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => a.max(b),
        (true, false) => a,
        (false, true) => b,
        (false, false) => f64::NAN,
    }
}

/// Builds the stall report for one row.
pub fn analyze_stalls(
    schema: &ResolvedSchema,
    row: &CounterRow,
    baselines: &CaptureBaselines,
    config: &XrayConfig,
) -> StallReport {
    let norm = &config.normalization;
    let metrics = DerivedMetrics::compute(schema, row, baselines, norm);
    let register = |id: MetricId| {
        to_fraction(
            schema.value(row, id),
            norm.percent_cutoff,
            norm.register_fraction_ceiling,
            true,
        )
    };
    let regs_3d = register(MetricId::Regs3dPct);
    let regs_ps = register(MetricId::RegsPsPct);
    let is_compute = metrics.cs_invocations > 0.0 && metrics.ps_invocations == 0.0;

    let top_stalls = metrics
        .stalls
        .top(config.top_stalls)
        .into_iter()
        .map(|(reason, fraction)| StallShare {
            reason,
            label: reason.label(),
            fraction,
        })
        .collect::<Vec<_>>();

    let dominant = top_stalls
        .first()
        .copied()
        .filter(|share| share.fraction > config.dominant_floor);

    let mut reasoning = Vec::new();
    let mut tips = Vec::new();
    let (title, confidence) = match dominant {
        Some(share) => {
            let guide = guidance(share.reason);
            reasoning.push(format!(
                "{} accounts for {} of stall time.",
                share.label,
                percent(share.fraction)
            ));
            reasoning.push(guide.why.to_string());
            match share.reason {
                StallReason::LongScoreboard if metrics.cache_poor(config.low_cache_hit) => {
                    reasoning.push(format!(
                        "Low cache hit rates: L1 ({}) / L2 ({}).",
                        percent(metrics.l1_hit),
                        percent(metrics.l2_hit)
                    ));
                }
                StallReason::NotSelected => {
                    let pressure = max_defined(regs_ps, regs_3d);
                    if pressure > config.high_register_fraction {
                        reasoning.push(format!(
                            "High register pressure ({}) limits occupancy.",
                            percent(pressure)
                        ));
                        tips.push("Use half precision to save registers.".to_string());
                    }
                }
                _ => {}
            }
            tips.extend(guide.fixes.iter().map(|fix| (*fix).to_string()));
            (
                share.label.to_string(),
                clamp01(share.fraction / config.full_confidence),
            )
        }
        None => ("Balanced".to_string(), 0.0),
    };

    let unresolved = EXPECTED
        .iter()
        .copied()
        .filter(|id| !schema.is_resolved(*id))
        .collect::<Vec<_>>();

    StallReport {
        title,
        dominant: dominant.map(|share| share.reason),
        confidence,
        reasoning,
        tips,
        top_stalls,
        metrics: XrayMetrics {
            time_ns: metrics.time_ns,
            active_ns: metrics.active_ns,
            samples: metrics.samples,
            invocations: if is_compute {
                metrics.cs_invocations
            } else {
                metrics.ps_invocations
            },
            l1_hit: metrics.l1_hit,
            l2_hit: metrics.l2_hit,
            ns_per_sample: metrics.ns_per_sample,
            inst_per_sample: metrics.inst_per_sample,
            dram_bytes: metrics.dram_bytes(),
            dram_bandwidth: metrics.dram_bandwidth,
            registers_used: if is_compute { regs_3d } else { regs_ps },
            registers_vtg: register(MetricId::RegsVtgPct),
        },
        unresolved,
    }
}

#[derive(Debug)]
pub struct ShaderXrayPanel {
    config: XrayConfig,
    catalog: &'static MetricCatalog,
    cache: BaselineCache,
}

impl Default for ShaderXrayPanel {
    fn default() -> Self {
        Self {
            config: XrayConfig::default(),
            catalog: MetricCatalog::standard(),
            cache: BaselineCache::new(),
        }
    }
}

impl ShaderXrayPanel {
    pub fn new(config: XrayConfig) -> Result<Self, BoundError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &XrayConfig {
        &self.config
    }
}

impl DiagnosticPanel for ShaderXrayPanel {
    type Report = StallReport;

    fn descriptor(&self) -> PanelDescriptor {
        SHADER_XRAY_DESCRIPTOR
    }

    fn diagnose(&self, request: PanelRequest<'_>) -> Diagnosis<StallReport> {
        let row = match select_row(&request) {
            Ok(row) => row,
            Err(placeholder) => return placeholder,
        };
        let context = self.cache.get_or_compute(request.capture, self.catalog);
        let report = analyze_stalls(&context.schema, row, &context.baselines, &self.config);
        if !report.unresolved.is_empty() {
            tracing::debug!(missing = report.unresolved.len(), "xray counters unresolved");
        }
        Diagnosis::Classified(Box::new(report))
    }
}
