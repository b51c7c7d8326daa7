// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Static dictionary of logical metrics and the raw column spellings that
//! may carry them in a capture.

use std::sync::OnceLock;

/// What a metric measures; drives unit conversion and normalization.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Canonical unit is nanoseconds.
    Time,
    Count,
    Bytes,
    /// Reported either as a 0..1 fraction or a 0..100 percent.
    Fraction,
    RegisterCount,
    /// Register usage as a share of the hardware maximum.
    RegisterFraction,
}

/// Unit tag attached to a spelling whose column is known to use a non-canonical unit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
}

impl TimeUnit {
    pub fn to_nanoseconds(self) -> f64 {
        match self {
            Self::Milliseconds => 1.0e6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spelling {
    pub name: String,
    pub unit: Option<TimeUnit>,
}

impl Spelling {
    fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: None,
        }
    }

    fn millis(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: Some(TimeUnit::Milliseconds),
        }
    }
}

macro_rules! metric_ids {
    ($($variant:ident => $key:literal),+ $(,)?) => {
        /// Logical metric identity, independent of how a capture spells its column.
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum MetricId {
            $($variant),+
        }

        impl MetricId {
            /// Every metric in catalog order.
            pub const ALL: &'static [MetricId] = &[$(MetricId::$variant),+];

            /// Stable snake_case identifier.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(MetricId::$variant => $key),+
                }
            }
        }
    };
}

metric_ids! {
    GpuTime => "gpu_time",
    GpuActive => "gpu_active",
    SamplesPassed => "samples_passed",
    PsInvocations => "ps_invocations",
    VsInvocations => "vs_invocations",
    CsInvocations => "cs_invocations",
    RasterizedPrimitives => "rasterized_primitives",
    InputVertices => "input_vertices",
    InputPrimitives => "input_primitives",
    GsPrimitives => "gs_primitives",
    RasterizerInvocations => "rasterizer_invocations",
    DramReadBytes => "dram_read_bytes",
    DramWriteBytes => "dram_write_bytes",
    DramReadSectors => "dram_read_sectors",
    DramWriteSectors => "dram_write_sectors",
    L1Hit => "l1_hit",
    L2Hit => "l2_hit",
    InstAll => "inst_all",
    InstVs => "inst_vs",
    InstTcs => "inst_tcs",
    InstTes => "inst_tes",
    InstGs => "inst_gs",
    InstPs => "inst_ps",
    InstCs => "inst_cs",
    StallBarrier => "stall_barrier",
    StallBranch => "stall_branch",
    StallDispatch => "stall_dispatch",
    StallDrain => "stall_drain",
    StallLgThrottle => "stall_lg_throttle",
    StallLongScoreboard => "stall_long_scoreboard",
    StallLongScoreboardL1tex => "stall_long_scoreboard_l1tex",
    StallMathThrottle => "stall_math_throttle",
    StallMembar => "stall_membar",
    StallMio => "stall_mio",
    StallMioPipe => "stall_mio_pipe",
    StallMisc => "stall_misc",
    StallNoInstruction => "stall_no_instruction",
    StallNotSelected => "stall_not_selected",
    StallSelected => "stall_selected",
    StallShortScoreboard => "stall_short_scoreboard",
    StallSleeping => "stall_sleeping",
    StallTexThrottle => "stall_tex_throttle",
    StallWait => "stall_wait",
    Regs3dCount => "regs_3d_count",
    Regs3dPct => "regs_3d_pct",
    RegsPsCount => "regs_ps_count",
    RegsPsPct => "regs_ps_pct",
    RegsVtgCount => "regs_vtg_count",
    RegsVtgPct => "regs_vtg_pct",
    RegsCsCount => "regs_cs_count",
    RegsCsPct => "regs_cs_pct",
    SharedWavefronts => "shared_wavefronts",
    SharedWavefrontsLoad => "shared_wavefronts_load",
    SharedWavefrontsStore => "shared_wavefronts_store",
    SharedWavefrontsAtomic => "shared_wavefronts_atomic",
    SharedBankConflicts => "shared_bank_conflicts",
    SharedBytesRead => "shared_bytes_read",
    SharedBytesAtomic => "shared_bytes_atomic",
    CropReadSubpackets => "crop_read_subpackets",
    CropWriteSubpackets => "crop_write_subpackets",
    ZropReadSubpackets => "zrop_read_subpackets",
    ZropWriteSubpackets => "zrop_write_subpackets",
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical metric and its acceptable spellings, most preferred first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDefinition {
    pub id: MetricId,
    pub kind: MetricKind,
    pub spellings: Vec<Spelling>,
}

impl MetricDefinition {
    pub fn new(id: MetricId, kind: MetricKind, spellings: Vec<Spelling>) -> Self {
        Self {
            id,
            kind,
            spellings,
        }
    }

    /// First listed spelling; used when exporting counter selections.
    pub fn preferred_spelling(&self) -> Option<&str> {
        self.spellings.first().map(|spelling| spelling.name.as_str())
    }
}

/// Ordered set of metric definitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
}

impl MetricCatalog {
    pub fn new(definitions: Vec<MetricDefinition>) -> Self {
        Self { definitions }
    }

    /// The built-in catalog, constructed once per process.
    pub fn standard() -> &'static MetricCatalog {
        static CATALOG: OnceLock<MetricCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            MetricCatalog::new(MetricId::ALL.iter().map(|id| standard_definition(*id)).collect())
        })
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: MetricId) -> Option<&MetricDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn counter(base: &str, extra: Vec<Spelling>) -> Vec<Spelling> {
    let mut out = vec![
        Spelling::plain(format!("{base}.sum")),
        Spelling::plain(format!("{base}.avg")),
        Spelling::plain(format!("{base}.max")),
        Spelling::plain(format!("{base}.min")),
        Spelling::plain(base),
    ];
    out.extend(extra);
    out
}

fn ratio(base: &str, extra: &[&str]) -> Vec<Spelling> {
    let mut out = vec![
        Spelling::plain(format!("{base}.avg.pct")),
        Spelling::plain(format!("{base}.avg.ratio")),
        Spelling::plain(format!("{base}.avg")),
        Spelling::plain(format!("{base}.pct")),
        Spelling::plain(format!("{base}.ratio")),
        Spelling::plain(base),
    ];
    out.extend(extra.iter().map(|name| Spelling::plain(*name)));
    out
}

fn generic(name: &str) -> Vec<Spelling> {
    vec![Spelling::plain(name)]
}

fn register_count(base: &str) -> Vec<Spelling> {
    vec![
        Spelling::plain(format!("{base}.avg.ratio")),
        Spelling::plain(format!("{base}.avg")),
        Spelling::plain(base),
    ]
}

fn register_pct(base: &str, extra: &[&str]) -> Vec<Spelling> {
    let mut out = vec![
        Spelling::plain(format!("{base}.avg.pct")),
        Spelling::plain(format!("{base}.pct")),
        Spelling::plain(format!("{base}.avg")),
        Spelling::plain(base),
    ];
    out.extend(extra.iter().map(|name| Spelling::plain(*name)));
    out
}

fn stall(reason: &str) -> Vec<Spelling> {
    ratio(
        &format!("smsp__warp_issue_stalled_{reason}_per_warp_active"),
        &[],
    )
}

fn standard_definition(id: MetricId) -> MetricDefinition {
    use MetricId::*;
    use MetricKind::*;

    let (kind, spellings) = match id {
        GpuTime => (
            Time,
            counter(
                "gpu__time_duration",
                vec![
                    Spelling::millis("GPU Duration"),
                    Spelling::millis("GPU Duration (ms)"),
                ],
            ),
        ),
        GpuActive => (Time, counter("gpu__time_active", vec![])),
        SamplesPassed => (Count, generic("Samples Passed")),
        PsInvocations => (Count, generic("PS Invocations")),
        VsInvocations => (Count, generic("VS Invocations")),
        CsInvocations => (Count, generic("CS Invocations")),
        RasterizedPrimitives => (Count, generic("Rasterized Primitives")),
        InputVertices => (Count, generic("Input Vertices Read")),
        InputPrimitives => (Count, generic("Input Primitives")),
        GsPrimitives => (Count, generic("GS Primitives")),
        RasterizerInvocations => (Count, generic("Rasterizer Invocations")),
        DramReadBytes => (Bytes, counter("dram__bytes_op_read", vec![])),
        DramWriteBytes => (Bytes, counter("dram__bytes_op_write", vec![])),
        DramReadSectors => (Count, counter("dram__sectors_op_read", vec![])),
        DramWriteSectors => (Count, counter("dram__sectors_op_write", vec![])),
        L1Hit => (
            Fraction,
            ratio(
                "l1tex__t_sector_hit_rate",
                &[
                    "l1tex__average_t_sector_lookup_hit.avg.pct",
                    "l1tex__t_sector_pipe_tex_hit_rate.avg.pct",
                    "l1tex__t_sector_pipe_tex_mem_texture_hit_rate.avg.pct",
                    "l1tex__average_t_sector_hit_rate_realtime.avg.pct",
                ],
            ),
        ),
        L2Hit => (
            Fraction,
            ratio(
                "lts__t_sector_hit_rate",
                &[
                    "lts__average_t_sector_hit_rate_realtime.avg.pct",
                    "lts__average_t_sector_lookup_hit.avg.pct",
                ],
            ),
        ),
        InstAll => (Count, counter("sm__inst_executed", vec![])),
        InstVs => (Count, counter("smsp__inst_executed_shader_vs", vec![])),
        InstTcs => (Count, counter("smsp__inst_executed_shader_tcs", vec![])),
        InstTes => (Count, counter("smsp__inst_executed_shader_tes", vec![])),
        InstGs => (Count, counter("smsp__inst_executed_shader_gs", vec![])),
        InstPs => (Count, counter("smsp__inst_executed_shader_ps", vec![])),
        InstCs => (Count, counter("smsp__inst_executed_shader_cs", vec![])),
        StallBarrier => (Fraction, stall("barrier")),
        StallBranch => (Fraction, stall("branch_resolving")),
        StallDispatch => (Fraction, stall("dispatch_stall")),
        StallDrain => (Fraction, stall("drain")),
        StallLgThrottle => (Fraction, stall("lg_throttle")),
        StallLongScoreboard => (Fraction, stall("long_scoreboard")),
        StallLongScoreboardL1tex => (Fraction, stall("long_scoreboard_pipe_l1tex")),
        StallMathThrottle => (Fraction, stall("math_pipe_throttle")),
        StallMembar => (Fraction, stall("membar")),
        StallMio => (Fraction, stall("mio_throttle")),
        StallMioPipe => (Fraction, stall("mio_throttle_pipe_mio")),
        StallMisc => (Fraction, stall("misc")),
        StallNoInstruction => (Fraction, stall("no_instruction")),
        StallNotSelected => (Fraction, stall("not_selected")),
        StallSelected => (Fraction, stall("selected")),
        StallShortScoreboard => (Fraction, stall("short_scoreboard")),
        StallSleeping => (Fraction, stall("sleeping")),
        StallTexThrottle => (Fraction, stall("tex_throttle")),
        StallWait => (Fraction, stall("wait")),
        Regs3dCount => (
            RegisterCount,
            register_count("tpc__average_registers_per_thread_shader_3d"),
        ),
        Regs3dPct => (
            RegisterFraction,
            register_pct(
                "tpc__average_registers_per_thread_shader_3d",
                &["tc__average_registers_per_thread_shader_3d.avg.pct"],
            ),
        ),
        RegsPsCount => (
            RegisterCount,
            register_count("tpc__average_registers_per_thread_shader_ps"),
        ),
        RegsPsPct => (
            RegisterFraction,
            register_pct(
                "tpc__average_registers_per_thread_shader_ps",
                &["tc__average_registers_per_thread_shader_ps.avg.pct"],
            ),
        ),
        RegsVtgCount => (
            RegisterCount,
            register_count("tpc__average_registers_per_thread_shader_vtg"),
        ),
        RegsVtgPct => (
            RegisterFraction,
            register_pct(
                "tpc__average_registers_per_thread_shader_vtg",
                &["tc__average_registers_per_thread_shader_vs.avg.pct"],
            ),
        ),
        RegsCsCount => (
            RegisterCount,
            register_count("tpc__average_registers_per_thread_shader_cs"),
        ),
        RegsCsPct => (
            RegisterFraction,
            register_pct("tpc__average_registers_per_thread_shader_cs", &[]),
        ),
        SharedWavefronts => (
            Count,
            counter("l1tex__data_pipe_lsu_wavefronts_mem_shared", vec![]),
        ),
        SharedWavefrontsLoad => (
            Count,
            counter("l1tex__data_pipe_lsu_wavefronts_mem_shared_op_ld", vec![]),
        ),
        SharedWavefrontsStore => (
            Count,
            counter("l1tex__data_pipe_lsu_wavefronts_mem_shared_op_st", vec![]),
        ),
        SharedWavefrontsAtomic => (
            Count,
            counter("l1tex__data_pipe_lsu_wavefronts_mem_shared_op_atom", vec![]),
        ),
        SharedBankConflicts => (
            Count,
            counter("l1tex__data_bank_conflicts_pipe_lsu_mem_shared", vec![]),
        ),
        SharedBytesRead => (Bytes, counter("smsp__bytes_mem_shared_cmd_read", vec![])),
        SharedBytesAtomic => (Bytes, counter("smsp__bytes_mem_shared_cmd_atom", vec![])),
        CropReadSubpackets => (Count, counter("crop__read_subpackets", vec![])),
        CropWriteSubpackets => (Count, counter("crop__write_subpackets", vec![])),
        ZropReadSubpackets => (Count, counter("zrop__read_subpackets", vec![])),
        ZropWriteSubpackets => (Count, counter("zrop__write_subpackets", vec![])),
    };

    MetricDefinition::new(id, kind, spellings)
}

#[cfg(test)]
mod tests {
    use super::{MetricCatalog, MetricId, MetricKind, TimeUnit};
    use std::collections::BTreeSet;

    #[test]
    fn standard_catalog_defines_every_metric_once_in_order() {
        let catalog = MetricCatalog::standard();
        assert_eq!(catalog.len(), MetricId::ALL.len());
        for (definition, id) in catalog.definitions().iter().zip(MetricId::ALL) {
            assert_eq!(definition.id, *id);
            assert!(!definition.spellings.is_empty(), "{id} has no spellings");
        }
    }

    #[test]
    fn metric_keys_are_unique() {
        let keys = MetricId::ALL
            .iter()
            .map(|id| id.as_str())
            .collect::<BTreeSet<_>>();
        assert_eq!(keys.len(), MetricId::ALL.len());
    }

    #[test]
    fn gpu_time_prefers_aggregated_counter_and_tags_duration_as_millis() {
        let definition = MetricCatalog::standard()
            .get(MetricId::GpuTime)
            .expect("gpu time is defined");
        assert_eq!(definition.kind, MetricKind::Time);
        assert_eq!(
            definition.preferred_spelling(),
            Some("gpu__time_duration.sum")
        );
        let duration = definition
            .spellings
            .iter()
            .find(|spelling| spelling.name == "GPU Duration")
            .expect("GPU Duration spelling present");
        assert_eq!(duration.unit, Some(TimeUnit::Milliseconds));
    }

    #[test]
    fn stall_spellings_follow_ratio_suffix_order() {
        let definition = MetricCatalog::standard()
            .get(MetricId::StallLongScoreboard)
            .expect("stall is defined");
        let names = definition
            .spellings
            .iter()
            .map(|spelling| spelling.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "smsp__warp_issue_stalled_long_scoreboard_per_warp_active.avg.pct",
                "smsp__warp_issue_stalled_long_scoreboard_per_warp_active.avg.ratio",
                "smsp__warp_issue_stalled_long_scoreboard_per_warp_active.avg",
                "smsp__warp_issue_stalled_long_scoreboard_per_warp_active.pct",
                "smsp__warp_issue_stalled_long_scoreboard_per_warp_active.ratio",
                "smsp__warp_issue_stalled_long_scoreboard_per_warp_active",
            ]
        );
    }
}
