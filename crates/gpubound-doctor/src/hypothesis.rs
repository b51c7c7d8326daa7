// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Bottleneck hypotheses. Each one scores independently from the same
//! signals; the classifier ranks them.

use crate::config::ClassifierConfig;
use gpubound_core::{CaptureBaselines, DerivedMetrics, DominantStage, StallReason};

/// Stable identifier of a hypothesis.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HypothesisId(&'static str);

impl HypothesisId {
    pub const GPU_IDLE: HypothesisId = HypothesisId("gpu_idle");
    pub const TEXTURE: HypothesisId = HypothesisId("texture");
    pub const MEMORY_LATENCY: HypothesisId = HypothesisId("memory_latency");
    pub const LOAD_STORE: HypothesisId = HypothesisId("load_store");
    pub const ALU: HypothesisId = HypothesisId("alu");
    pub const OCCUPANCY: HypothesisId = HypothesisId("occupancy");
    pub const BRANCH_DIVERGENCE: HypothesisId = HypothesisId("branch_divergence");
    pub const BARRIER: HypothesisId = HypothesisId("barrier");
    pub const ATOMICS: HypothesisId = HypothesisId("atomics");
    pub const INSTRUCTION_FETCH: HypothesisId = HypothesisId("instruction_fetch");
    pub const SHARED_MEMORY: HypothesisId = HypothesisId("shared_memory");
    pub const BACKEND: HypothesisId = HypothesisId("backend");
    pub const VERTEX_COST: HypothesisId = HypothesisId("vertex_cost");
    pub const PIXEL_THROUGHPUT: HypothesisId = HypothesisId("pixel_throughput");
    pub const INSUFFICIENT_DATA: HypothesisId = HypothesisId("insufficient_data");

    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for HypothesisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Inputs every hypothesis scores against.
#[derive(Clone, Copy, Debug)]
pub struct Signals<'a> {
    pub metrics: &'a DerivedMetrics,
    pub baselines: &'a CaptureBaselines,
    pub config: &'a ClassifierConfig,
}

impl Signals<'_> {
    pub fn stall(&self, reason: StallReason) -> f64 {
        self.metrics.stalls.get(reason)
    }

    pub fn cache_poor(&self) -> bool {
        self.metrics.cache_poor(self.config.cache_low)
    }

    pub fn stage(&self) -> DominantStage {
        self.metrics.stage.stage
    }
}

/// A named bottleneck category with a uniform scoring capability.
pub trait Hypothesis: Send + Sync {
    fn id(&self) -> HypothesisId;

    fn title(&self, signals: &Signals<'_>) -> String;

    /// Raw score; the classifier clamps it to `[0, 1]`.
    fn score(&self, signals: &Signals<'_>) -> f64;

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String>;

    /// Quick experiment that confirms or refutes the diagnosis.
    fn check(&self) -> &'static str;

    fn remediation(&self, signals: &Signals<'_>) -> Vec<String>;
}

fn pct(fraction: f64) -> String {
    if !fraction.is_finite() {
        return "n/a".to_string();
    }
    format!("{:.0}%", fraction.clamp(0.0, 1.0) * 100.0)
}

fn count(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.0}")
    } else {
        "n/a".to_string()
    }
}

fn duration(ns: f64) -> String {
    if !ns.is_finite() {
        "n/a".to_string()
    } else if ns >= 1.0e6 {
        format!("{:.3} ms", ns / 1.0e6)
    } else if ns >= 1.0e3 {
        format!("{:.2} us", ns / 1.0e3)
    } else {
        format!("{ns:.0} ns")
    }
}

fn throughput(bytes_per_second: f64) -> String {
    if bytes_per_second.is_finite() {
        format!("{:.2} GB/s", bytes_per_second / 1.0e9)
    } else {
        "n/a".to_string()
    }
}

fn cache_line(signals: &Signals<'_>) -> String {
    if signals.metrics.cache_known() {
        format!(
            "Hit rate: L1 ~{}, L2 ~{}.",
            pct(signals.metrics.l1_hit),
            pct(signals.metrics.l2_hit)
        )
    } else {
        "Cache hit rates unavailable.".to_string()
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

pub struct GpuIdle;

impl Hypothesis for GpuIdle {
    fn id(&self) -> HypothesisId {
        HypothesisId::GPU_IDLE
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "GPU idle (likely CPU-bound or synchronization)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        if !signals.metrics.has_time() {
            return 0.0;
        }
        signals.config.idle.active_ratio.eval(signals.metrics.active_ratio)
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        vec![
            format!(
                "GPU active only {} of the elapsed time.",
                pct(signals.metrics.active_ratio)
            ),
            "Low activity usually means waiting: CPU/GPU synchronization, a CPU-side limit, or Present/VSync."
                .to_string(),
        ]
    }

    fn check(&self) -> &'static str {
        "Lower resolution or quality settings. If GPU duration barely changes, the limit is upstream of this draw (CPU or synchronization)."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Reduce draw/dispatch count: batching, instancing, merging materials.",
            "Remove synchronization points (readbacks, blocking Map/Unmap, premature WaitForIdle).",
            "Check VSync, frame limiters and swapchain waits.",
        ])
    }
}

pub struct TextureBound;

impl Hypothesis for TextureBound {
    fn id(&self) -> HypothesisId {
        HypothesisId::TEXTURE
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Texture/L1TEX bound (heavy sampling, waiting on textures)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.texture;
        let tex = signals.stall(StallReason::TexThrottle);
        let mut score = 0.0;
        if tex.is_finite() {
            score = config.tex_stall.eval(tex)
                + config
                    .l1tex_boost
                    .eval(signals.stall(StallReason::LongScoreboardL1tex));
            if signals.cache_poor() {
                score += config.poor_cache_bonus;
            }
        }
        if signals.stage() == DominantStage::Vtg {
            score *= config.vtg_factor;
        }
        score
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let l1tex = signals.stall(StallReason::LongScoreboardL1tex);
        let relative_bw = signals.metrics.relative.dram_bandwidth;
        vec![
            if l1tex.is_finite() {
                format!(
                    "Texture throttle: {}, long scoreboard (L1TEX): {}.",
                    pct(signals.stall(StallReason::TexThrottle)),
                    pct(l1tex)
                )
            } else {
                format!(
                    "Texture throttle: {}.",
                    pct(signals.stall(StallReason::TexThrottle))
                )
            },
            cache_line(signals),
            if relative_bw.is_finite() {
                format!(
                    "DRAM bandwidth at ~{:.0}% of the capture p90.",
                    relative_bw * 100.0
                )
            } else {
                "DRAM bandwidth baseline unavailable.".to_string()
            },
        ]
    }

    fn check(&self) -> &'static str {
        "Temporarily reduce texture sampling (1x1 textures, LOD bias, no anisotropy). GPU duration should drop noticeably."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Cut texture samples, especially inside loops.",
            "Lower texture LOD or resolution for this pass and use more compact formats.",
            "Improve locality: atlases, fewer distinct textures, no random access.",
        ])
    }
}

pub struct MemoryLatency;

impl Hypothesis for MemoryLatency {
    fn id(&self) -> HypothesisId {
        HypothesisId::MEMORY_LATENCY
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Memory latency bound (waiting on data, cache misses)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.memory_latency;
        let long = signals.stall(StallReason::LongScoreboard);
        if !long.is_finite() {
            return 0.0;
        }
        let relative = &signals.metrics.relative;
        let mut score = config.long_stall.eval(long)
            + config.bandwidth_boost.eval(relative.dram_bandwidth)
            + config
                .bytes_per_instruction_boost
                .eval(relative.bytes_per_instruction)
            + config
                .l1tex_boost
                .eval(signals.stall(StallReason::LongScoreboardL1tex));
        if signals.cache_poor() {
            score += config.poor_cache_bonus;
        }
        score
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let metrics = signals.metrics;
        let l1tex = signals.stall(StallReason::LongScoreboardL1tex);
        let long = pct(signals.stall(StallReason::LongScoreboard));
        vec![
            if l1tex.is_finite() {
                format!("Long scoreboard: {long} (L1TEX share: {}).", pct(l1tex))
            } else {
                format!("Long scoreboard: {long}.")
            },
            cache_line(signals),
            format!(
                "DRAM: read {}, write {}, bandwidth ~{}.",
                count(metrics.dram_read_bytes),
                count(metrics.dram_write_bytes),
                throughput(metrics.dram_bandwidth)
            ),
        ]
    }

    fn check(&self) -> &'static str {
        "Temporarily cut reads or writes (disable a buffer or texture, substitute a constant for a fetch). If GPU duration drops, memory is the limiter."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Pack data tighter: fewer bytes per element, compact formats.",
            "Improve locality: sequential access, fewer scattered indices.",
            "Issue fewer memory accesses: cache in registers or shared memory, merge reads.",
        ])
    }
}

pub struct LoadStoreQueue;

impl Hypothesis for LoadStoreQueue {
    fn id(&self) -> HypothesisId {
        HypothesisId::LOAD_STORE
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Load/store queue saturated (too many LD/ST)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.load_store;
        let lg = signals.stall(StallReason::LgThrottle);
        if !lg.is_finite() {
            return 0.0;
        }
        config.lg_stall.eval(lg)
            + config
                .bytes_per_instruction_boost
                .eval(signals.metrics.relative.bytes_per_instruction)
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let bytes_per_inst = signals.metrics.bytes_per_instruction;
        vec![
            format!("LG throttle: {}.", pct(signals.stall(StallReason::LgThrottle))),
            if bytes_per_inst.is_finite() {
                let relative = signals.metrics.relative.bytes_per_instruction;
                let relative = if relative.is_finite() {
                    format!("{:.0}%", relative * 100.0)
                } else {
                    "n/a".to_string()
                };
                format!("Bytes per instruction ~{bytes_per_inst:.2} ({relative} of the capture p90).")
            } else {
                "Bytes per instruction unavailable.".to_string()
            },
        ]
    }

    fn check(&self) -> &'static str {
        "Remove some reads or writes (one array or render target), or bind an empty shader. lg_throttle and GPU duration should fall."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Merge several accesses into one (vector loads, packed data).",
            "Avoid redundant writes; write only what is needed.",
            "Read and write sequentially (coalescing) and reduce address scatter.",
        ])
    }
}

pub struct AluBound;

impl Hypothesis for AluBound {
    fn id(&self) -> HypothesisId {
        HypothesisId::ALU
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "ALU bound (math pipe)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.alu;
        let math = signals.stall(StallReason::MathThrottle);
        if !math.is_finite() {
            return 0.0;
        }
        let mut score = config.math_stall.eval(math);
        let long = signals.stall(StallReason::LongScoreboard);
        if long.is_finite() && long < config.low_latency_below {
            score += config.low_latency_bonus;
        }
        if signals.metrics.cache_known() && !signals.cache_poor() {
            score += config.healthy_cache_bonus;
        }
        score
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let metrics = signals.metrics;
        vec![
            format!(
                "Math pipe throttle: {}.",
                pct(signals.stall(StallReason::MathThrottle))
            ),
            if metrics.inst_all.is_finite() {
                format!("Instructions executed: {}.", count(metrics.inst_all))
            } else {
                "Instructions executed: n/a.".to_string()
            },
            format!("GPU time: {}.", duration(metrics.time_ns)),
        ]
    }

    fn check(&self) -> &'static str {
        "Simplify the shader (drop loops and expensive functions such as pow/exp/sin, lower quality). Time should drop markedly."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Remove or shorten loops and cut operations per pixel or vertex.",
            "Replace expensive functions with approximations or lookup tables.",
            "Lower precision where acceptable (half/mediump) and skip redundant normalizations.",
        ])
    }
}

pub struct OccupancyLimited;

impl Hypothesis for OccupancyLimited {
    fn id(&self) -> HypothesisId {
        HypothesisId::OCCUPANCY
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Occupancy limited (registers or resources cap resident warps)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.occupancy;
        let not_selected = signals.stall(StallReason::NotSelected);
        if !not_selected.is_finite() {
            return 0.0;
        }
        config.not_selected_stall.eval(not_selected)
            + config
                .register_fraction_boost
                .eval(signals.metrics.register_fraction)
            + config
                .register_count_boost
                .eval(signals.metrics.register_count)
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let metrics = signals.metrics;
        let registers = match (
            metrics.register_count.is_finite(),
            metrics.register_fraction.is_finite(),
        ) {
            (true, true) => format!(
                "Registers per thread: ~{:.0} ({} of the maximum).",
                metrics.register_count,
                pct(metrics.register_fraction)
            ),
            (true, false) => format!("Registers per thread: ~{:.0}.", metrics.register_count),
            (false, true) => format!("Register usage: {} of the maximum.", pct(metrics.register_fraction)),
            (false, false) => "Registers: n/a.".to_string(),
        };
        vec![
            format!(
                "Not selected: {}; many warps cannot run concurrently.",
                pct(signals.stall(StallReason::NotSelected))
            ),
            registers,
            format!("Dominant stage: {}.", signals.stage().label()),
        ]
    }

    fn check(&self) -> &'static str {
        "Reduce register pressure (less unrolling, split the shader, cap registers at compile time). not_selected and GPU duration should fall."
    }

    fn remediation(&self, signals: &Signals<'_>) -> Vec<String> {
        let mut out = lines(&[
            "Cut temporaries and large local arrays.",
            "Avoid aggressive loop unrolling; it inflates register use.",
        ]);
        if signals.stage() == DominantStage::Compute {
            out.push("Tune the thread group size to improve occupancy.".to_string());
        } else {
            out.push("For compute work, tune the thread group size to improve occupancy.".to_string());
        }
        out
    }
}

pub struct BranchDivergence;

impl Hypothesis for BranchDivergence {
    fn id(&self) -> HypothesisId {
        HypothesisId::BRANCH_DIVERGENCE
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Branch divergence (warps split across paths)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        signals
            .config
            .branch
            .stall
            .eval(signals.stall(StallReason::Branch))
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        vec![
            format!("Branch resolving: {}.", pct(signals.stall(StallReason::Branch))),
            format!("Stage: {}.", signals.stage().label()),
        ]
    }

    fn check(&self) -> &'static str {
        "Force one path by making the branch condition constant. If time drops, divergence is the problem."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Keep threads of a warp on the same path (sort data, group cases).",
            "Use predication where it is cheaper than branching.",
            "Avoid nested branches and early exits in hot code.",
        ])
    }
}

pub struct BarrierSync;

impl Hypothesis for BarrierSync {
    fn id(&self) -> HypothesisId {
        HypothesisId::BARRIER
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Synchronization bound (barriers)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.barrier;
        let barrier = signals.stall(StallReason::Barrier);
        if !barrier.is_finite() {
            return 0.0;
        }
        let score = config.stall.eval(barrier);
        if signals.stage() == DominantStage::Compute {
            score
        } else {
            score * config.non_compute_factor
        }
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        vec![
            format!("Barrier stall: {}.", pct(signals.stall(StallReason::Barrier))),
            format!("Stage: {}.", signals.stage().label()),
        ]
    }

    fn check(&self) -> &'static str {
        "For compute work, temporarily remove or thin out barrier()/GroupMemoryBarrier calls. GPU duration should drop."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Use fewer barriers and merge work between them.",
            "Prefer warp-level primitives over group-wide synchronization.",
            "Shrink the group size or repartition data to shorten waits.",
        ])
    }
}

pub struct AtomicsFence;

impl Hypothesis for AtomicsFence {
    fn id(&self) -> HypothesisId {
        HypothesisId::ATOMICS
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Atomics or memory fences stall execution".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        signals
            .config
            .atomics
            .stall
            .eval(signals.stall(StallReason::Membar))
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let mut out = vec![format!(
            "Membar stall: {}.",
            pct(signals.stall(StallReason::Membar))
        )];
        if signals.metrics.write_ratio.is_finite() {
            out.push(format!(
                "DRAM write share: {}.",
                pct(signals.metrics.write_ratio)
            ));
        }
        out
    }

    fn check(&self) -> &'static str {
        "Remove atomics or fences, or replace them with local accumulation and a reduction. Time should drop."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Minimize atomics: reduce in shared memory or within a warp, then issue one atomic.",
            "Partition data to reduce contention on shared addresses.",
            "Avoid unnecessary memory fences.",
        ])
    }
}

pub struct InstructionFetch;

impl Hypothesis for InstructionFetch {
    fn id(&self) -> HypothesisId {
        HypothesisId::INSTRUCTION_FETCH
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Instruction fetch bound (shader too large or complex)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        signals
            .config
            .instruction_fetch
            .stall
            .eval(signals.stall(StallReason::NoInstruction))
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        vec![
            format!(
                "No-instruction stall: {}.",
                pct(signals.stall(StallReason::NoInstruction))
            ),
            "Often caused by large code: many variants, unrolling, many functions.".to_string(),
        ]
    }

    fn check(&self) -> &'static str {
        "Disable shader features or branches and remove unrolling. If no_instruction falls and time improves, code size is the issue."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Shrink the shader: drop dead branches or split it into passes.",
            "Limit unrolling and specializations that bloat code.",
            "Reuse shared functions instead of duplicating code.",
        ])
    }
}

pub struct SharedMemoryConflicts;

impl Hypothesis for SharedMemoryConflicts {
    fn id(&self) -> HypothesisId {
        HypothesisId::SHARED_MEMORY
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Shared memory bank conflicts (serialized access)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.shared_memory;
        let conflicts = signals.metrics.bank_conflicts_per_wavefront;
        if !conflicts.is_finite() || conflicts <= 0.0 {
            return 0.0;
        }
        config.conflicts_per_wavefront.eval(conflicts)
            + config
                .short_scoreboard_boost
                .eval(signals.stall(StallReason::ShortScoreboard))
            + config
                .relative_boost
                .eval(signals.metrics.relative.bank_conflicts)
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let conflicts = signals.metrics.bank_conflicts_per_wavefront;
        let p90 = signals
            .baselines
            .p90(gpubound_core::BaselineKey::BankConflictsPerWavefront);
        let mut out = vec![if p90.is_finite() {
            format!("Bank conflicts per shared wavefront: {conflicts:.2} (p90 ~{p90:.2}).")
        } else {
            format!("Bank conflicts per shared wavefront: {conflicts:.2}.")
        }];
        let short = signals.stall(StallReason::ShortScoreboard);
        if short.is_finite() {
            out.push(format!("Short scoreboard: {}.", pct(short)));
        }
        out.push(format!(
            "Shared memory throughput ~{}.",
            throughput(signals.metrics.shared_bandwidth)
        ));
        out
    }

    fn check(&self) -> &'static str {
        "Change the shared memory layout (padding, strides) or access pattern. Bank conflicts and time should fall."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Add padding so threads hit different banks.",
            "Make access more linear; avoid addresses sharing low bits.",
            "Use vectorized loads and stores (float2/float4) where appropriate.",
        ])
    }
}

pub struct BackendOutput;

impl Hypothesis for BackendOutput {
    fn id(&self) -> HypothesisId {
        HypothesisId::BACKEND
    }

    fn title(&self, signals: &Signals<'_>) -> String {
        let crop = signals.metrics.crop_write_subpackets;
        let zrop = signals.metrics.zrop_write_subpackets;
        if !crop.is_finite() && !zrop.is_finite() {
            return "Backend/ROP output bound (write-heavy)".to_string();
        }
        let unit = if zrop.is_finite() && (!crop.is_finite() || zrop > crop) {
            "ZROP depth/stencil"
        } else {
            "CROP color/blend"
        };
        format!("Backend/ROP output bound ({unit})")
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.backend;
        let metrics = signals.metrics;
        let relative_rate = metrics.relative.backend_write_rate;
        let score = if relative_rate.is_finite() {
            config.write_rate.eval(relative_rate) + config.write_share.eval(metrics.write_ratio)
        } else if metrics.write_ratio.is_finite()
            && metrics.write_ratio > config.fallback_write_share_min
        {
            config.fallback_base + config.fallback_boost.eval(metrics.write_ratio)
        } else {
            return 0.0;
        };
        if signals.stage() == DominantStage::Pixel {
            score
        } else {
            score * config.non_pixel_factor
        }
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let metrics = signals.metrics;
        let relative_rate = metrics.relative.backend_write_rate;
        let mut out = vec![
            if relative_rate.is_finite() {
                format!(
                    "Subpacket write rate at ~{:.0}% of the capture p90.",
                    relative_rate * 100.0
                )
            } else {
                "Subpacket write rate unavailable (no baseline).".to_string()
            },
            format!("DRAM write share: {}.", pct(metrics.write_ratio)),
        ];
        if metrics.samples.is_finite() {
            out.push(format!("Samples passed: {}.", count(metrics.samples)));
        }
        out
    }

    fn check(&self) -> &'static str {
        "Lower resolution or shrink the drawn area (scissor, LOD, culling), disable MSAA or blending. Time should fall almost proportionally."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Reduce overdraw: depth sorting, early-Z, discard invisible work.",
            "Use fewer render targets or lighter formats.",
            "Lower MSAA or resolution for this pass, or use dynamic resolution.",
        ])
    }
}

pub struct VertexCost;

impl Hypothesis for VertexCost {
    fn id(&self) -> HypothesisId {
        HypothesisId::VERTEX_COST
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Vertex processing cost (expensive primitives)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.vertex_cost;
        let score = config
            .signal
            .eval(signals.metrics.relative.cost_per_primitive);
        if signals.stage() == DominantStage::Vtg {
            score
        } else {
            score * config.off_stage_factor
        }
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let metrics = signals.metrics;
        let median = signals
            .baselines
            .median(gpubound_core::BaselineKey::NsPerPrimitive);
        vec![
            format!(
                "Each primitive takes {:.1} ns (capture median {:.1} ns).",
                metrics.ns_per_primitive, median
            ),
            format!(
                "Relative cost per primitive: {:.2}x.",
                metrics.relative.cost_per_primitive
            ),
            format!("Stage: {}.", signals.stage().label()),
        ]
    }

    fn check(&self) -> &'static str {
        "Simplify the vertex path (fewer attributes, cheaper skinning or tessellation). Time per primitive should drop."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Reduce per-vertex work: precompute or move math to a lower frequency.",
            "Trim vertex attributes and use compact formats.",
            "Lower tessellation factors or geometry amplification.",
        ])
    }
}

pub struct PixelThroughput;

impl Hypothesis for PixelThroughput {
    fn id(&self) -> HypothesisId {
        HypothesisId::PIXEL_THROUGHPUT
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Pixel throughput bound (large pixel count)".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        let config = &signals.config.pixel_throughput;
        let score = config.signal.eval(signals.metrics.relative.sample_work);
        if signals.stage() == DominantStage::Pixel {
            score
        } else {
            score * config.off_stage_factor
        }
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let metrics = signals.metrics;
        vec![
            format!(
                "Samples passed: {} ({:.2}x the capture p90).",
                count(metrics.samples),
                metrics.relative.sample_work
            ),
            if metrics.relative.cost_per_sample.is_finite() {
                format!(
                    "Cost per sample: {:.2}x the capture median; shader cost looks normal.",
                    metrics.relative.cost_per_sample
                )
            } else {
                "Cost per sample: n/a.".to_string()
            },
        ]
    }

    fn check(&self) -> &'static str {
        "Render at a lower resolution. Time should fall almost proportionally while cost per sample stays flat."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Shade fewer pixels: lower resolution, tighter scissor, better culling.",
            "Reduce overdraw with a depth pre-pass or front-to-back sorting.",
            "Use variable rate shading or dynamic resolution where available.",
        ])
    }
}

/// Largest tracked stall or relative-cost signal, used as a directional hint.
///
/// Stalls weigh in as fractions of warp time; relative costs by how far they
/// exceed the capture median, so a typical row (1.0x) carries no weight.
pub fn leading_signal(metrics: &DerivedMetrics) -> Option<(String, f64, String)> {
    let stalls = metrics
        .stalls
        .top(1)
        .into_iter()
        .map(|(reason, value)| (value, (reason.label().to_string(), value, pct(value))));
    let costs = [
        ("relative cost per sample", metrics.relative.cost_per_sample),
        ("relative cost per primitive", metrics.relative.cost_per_primitive),
        ("relative instructions per sample", metrics.relative.inst_per_sample),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_finite() && *value > 1.0)
    .map(|(label, value)| (value - 1.0, (label.to_string(), value, format!("{value:.2}x"))));

    let mut best: Option<(f64, (String, f64, String))> = None;
    for candidate in stalls.chain(costs) {
        if best.as_ref().is_none_or(|current| candidate.0 > current.0) {
            best = Some(candidate);
        }
    }
    best.map(|(_, signal)| signal)
}

/// Catch-all emitted when no hypothesis clears the minimum score.
pub struct InsufficientData;

impl Hypothesis for InsufficientData {
    fn id(&self) -> HypothesisId {
        HypothesisId::INSUFFICIENT_DATA
    }

    fn title(&self, _signals: &Signals<'_>) -> String {
        "Insufficient data for a confident diagnosis".to_string()
    }

    fn score(&self, signals: &Signals<'_>) -> f64 {
        signals.config.fallback_score
    }

    fn evidence(&self, signals: &Signals<'_>) -> Vec<String> {
        let hint = match leading_signal(signals.metrics) {
            Some((label, _, rendered)) => format!("Most prominent signal: {label} ({rendered})."),
            None => "Too little data to name a leading signal.".to_string(),
        };
        vec![
            hint,
            "Enable the counters from the exported counter settings and recapture.".to_string(),
        ]
    }

    fn check(&self) -> &'static str {
        "Enable the counters, recapture, then compare several draws: the one with more time and higher stalls holds the bottleneck."
    }

    fn remediation(&self, _signals: &Signals<'_>) -> Vec<String> {
        lines(&[
            "Capture counters for the problematic frame.",
            "Compare similar draws: what differs (pixels, textures, shader, render targets).",
        ])
    }
}

/// Ordered hypothesis set; order decides ties.
pub struct HypothesisRegistry {
    hypotheses: Vec<Box<dyn Hypothesis>>,
    fallback: Box<dyn Hypothesis>,
}

impl HypothesisRegistry {
    /// Empty registry with the standard catch-all.
    pub fn new() -> Self {
        Self {
            hypotheses: Vec::new(),
            fallback: Box::new(InsufficientData),
        }
    }

    pub fn standard() -> Self {
        Self::new()
            .with(GpuIdle)
            .with(TextureBound)
            .with(MemoryLatency)
            .with(LoadStoreQueue)
            .with(AluBound)
            .with(OccupancyLimited)
            .with(BranchDivergence)
            .with(BarrierSync)
            .with(AtomicsFence)
            .with(InstructionFetch)
            .with(SharedMemoryConflicts)
            .with(BackendOutput)
            .with(VertexCost)
            .with(PixelThroughput)
    }

    pub fn with<H: Hypothesis + 'static>(mut self, hypothesis: H) -> Self {
        self.push(Box::new(hypothesis));
        self
    }

    pub fn push(&mut self, hypothesis: Box<dyn Hypothesis>) {
        self.hypotheses.push(hypothesis);
    }

    pub fn with_fallback<H: Hypothesis + 'static>(mut self, fallback: H) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    pub fn hypotheses(&self) -> &[Box<dyn Hypothesis>] {
        &self.hypotheses
    }

    pub fn fallback(&self) -> &dyn Hypothesis {
        self.fallback.as_ref()
    }

    pub fn ids(&self) -> Vec<HypothesisId> {
        self.hypotheses.iter().map(|h| h.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }
}

impl Default for HypothesisRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for HypothesisRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HypothesisRegistry")
            .field("hypotheses", &self.ids())
            .field("fallback", &self.fallback.id())
            .finish()
    }
}
