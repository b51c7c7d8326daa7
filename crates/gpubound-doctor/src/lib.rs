// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod cache;
pub mod classifier;
pub mod config;
pub mod hypothesis;
pub mod panel;
pub mod result;
pub mod xray;

pub use cache::{BaselineCache, CaptureContext};
pub use classifier::BoundClassifier;
pub use config::{
    AluConfig, AtomicsConfig, BackendConfig, BarrierConfig, Boost, BranchConfig, ClassifierConfig,
    ConfidenceConfig, IdleConfig, InstructionFetchConfig, LoadStoreConfig, MemoryLatencyConfig,
    OccupancyConfig, Ramp, SharedMemoryConfig, StageCostConfig, TextureConfig, confidence_formula,
};
pub use hypothesis::{Hypothesis, HypothesisId, HypothesisRegistry, Signals, leading_signal};
pub use panel::{
    BOUND_DETECTOR_DESCRIPTOR, BoundDetectorPanel, DiagnosticPanel, PanelDescriptor, PanelRequest,
};
pub use result::{
    ClassificationResult, ConfidenceBreakdown, Diagnosis, RankedCandidate, SignalSummary,
};
pub use xray::{
    SHADER_XRAY_DESCRIPTOR, ShaderXrayPanel, StallReport, StallShare, XrayConfig, XrayMetrics,
    analyze_stalls,
};
