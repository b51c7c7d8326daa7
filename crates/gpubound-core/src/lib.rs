// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod capture;
pub mod catalog;
pub mod counter_settings;
pub mod derived;
pub mod error;
pub mod resolve;
pub mod stats;

pub use capture::{Capture, CaptureId, CounterRow};
pub use catalog::{MetricCatalog, MetricDefinition, MetricId, MetricKind, Spelling, TimeUnit};
pub use counter_settings::{catalog_names, counter_entry, djb2, parse_names, render_settings};
pub use derived::{
    DerivedMetrics, DominantStage, NormalizationConfig, RelativeMetrics, StageShare,
    StallBreakdown, StallReason, clamp01, detect_stage, relative_to, to_fraction,
};
pub use error::{BoundError, Result};
pub use resolve::{
    ColumnResolver, ResolvedColumn, ResolvedSchema, normalize_column_name, strip_unit_suffix,
};
pub use stats::{
    Baseline, BaselineKey, CaptureBaselines, compute_baseline, median, positive_ratio, quantile,
    rate_per_second, row_quantity, strict_sum,
};
