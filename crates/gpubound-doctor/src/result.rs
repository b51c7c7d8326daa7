// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::hypothesis::HypothesisId;
use gpubound_core::{MetricId, StageShare};

/// One hypothesis that cleared the minimum score.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    pub hypothesis: HypothesisId,
    pub title: String,
    pub score: f64,
}

/// Secondary signal shown next to the verdict, e.g. a top warp stall.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SignalSummary {
    pub key: &'static str,
    pub label: &'static str,
    pub value: f64,
}

/// Terms of the confidence formula, kept for explanation and auditing.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceBreakdown {
    pub best: f64,
    pub runner_up: f64,
    pub coverage: f64,
    /// Confidence before the missing-time factor.
    pub raw: f64,
    pub time_factor: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub hypothesis: HypothesisId,
    pub title: String,
    pub score: f64,
    pub confidence: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub evidence: Vec<String>,
    pub check: String,
    pub remediation: Vec<String>,
    pub signals: Vec<SignalSummary>,
    pub candidates: Vec<RankedCandidate>,
    pub stage: StageShare,
    pub coverage: f64,
    pub unresolved: Vec<MetricId>,
    pub warnings: Vec<String>,
}

impl ClassificationResult {
    /// Whether the verdict is the catch-all rather than a scored bound.
    pub fn is_fallback(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn runner_up(&self) -> Option<&RankedCandidate> {
        self.candidates.get(1)
    }
}

/// What a panel shows for one request. `R` is the panel's report type.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnosis<R = ClassificationResult> {
    NoSelection,
    EmptyCapture,
    SelectionOutOfRange { index: usize, rows: usize },
    Classified(Box<R>),
}

impl<R> Diagnosis<R> {
    pub fn result(&self) -> Option<&R> {
        match self {
            Self::Classified(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSelection => "no_selection",
            Self::EmptyCapture => "empty_capture",
            Self::SelectionOutOfRange { .. } => "selection_out_of_range",
            Self::Classified(_) => "classified",
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::{ClassificationResult, Diagnosis, RankedCandidate};
    use crate::hypothesis::HypothesisId;

    #[test]
    fn placeholder_diagnoses_serialize_with_status_tag() {
        let json = serde_json::to_value(Diagnosis::<ClassificationResult>::SelectionOutOfRange {
            index: 7,
            rows: 3,
        })
            .expect("diagnosis should serialize");
        assert_eq!(json["status"], "selection_out_of_range");
        assert_eq!(json["index"], 7);
        assert_eq!(json["rows"], 3);

        let json = serde_json::to_value(Diagnosis::<ClassificationResult>::NoSelection)
            .expect("diagnosis should serialize");
        assert_eq!(json["status"], "no_selection");
    }

    #[test]
    fn candidate_id_serializes_as_plain_string() {
        let candidate = RankedCandidate {
            hypothesis: HypothesisId::BACKEND,
            title: "Backend".to_string(),
            score: 0.5,
        };
        let json = serde_json::to_value(&candidate).expect("candidate should serialize");
        assert_eq!(json["hypothesis"], "backend");
    }
}
