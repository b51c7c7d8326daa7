// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::cache::CaptureContext;
use crate::config::ClassifierConfig;
use crate::hypothesis::{Hypothesis, HypothesisRegistry, Signals};
use crate::result::{ClassificationResult, ConfidenceBreakdown, RankedCandidate, SignalSummary};
use gpubound_core::{
    BoundError, CaptureBaselines, CounterRow, DerivedMetrics, MetricId, ResolvedSchema, clamp01,
};

/// Scores every registered hypothesis against one row and picks the best.
#[derive(Debug)]
pub struct BoundClassifier {
    config: ClassifierConfig,
    registry: HypothesisRegistry,
}

struct Scored<'a> {
    hypothesis: &'a dyn Hypothesis,
    score: f64,
}

impl BoundClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, BoundError> {
        Self::with_registry(config, HypothesisRegistry::standard())
    }

    pub fn with_registry(
        config: ClassifierConfig,
        registry: HypothesisRegistry,
    ) -> Result<Self, BoundError> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn registry(&self) -> &HypothesisRegistry {
        &self.registry
    }

    /// Derives metrics for `row` and classifies them.
    pub fn classify(&self, context: &CaptureContext, row: &CounterRow) -> ClassificationResult {
        let metrics = DerivedMetrics::compute(
            &context.schema,
            row,
            &context.baselines,
            &self.config.normalization,
        );
        self.classify_metrics(&metrics, &context.baselines, &context.schema)
    }

    pub fn classify_metrics(
        &self,
        metrics: &DerivedMetrics,
        baselines: &CaptureBaselines,
        schema: &ResolvedSchema,
    ) -> ClassificationResult {
        let signals = Signals {
            metrics,
            baselines,
            config: &self.config,
        };

        let mut ranked = Vec::with_capacity(self.registry.len());
        for hypothesis in self.registry.hypotheses() {
            let score = clamp01(hypothesis.score(&signals));
            tracing::debug!(hypothesis = hypothesis.id().as_str(), score, "scored hypothesis");
            if score > self.config.min_score {
                ranked.push(Scored {
                    hypothesis: hypothesis.as_ref(),
                    score,
                });
            }
        }
        // Stable: equal scores keep registry order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let (chosen, score) = match ranked.first() {
            Some(best) => (best.hypothesis, best.score),
            None => {
                let fallback = self.registry.fallback();
                (fallback, clamp01(fallback.score(&signals)))
            }
        };
        let runner_up = ranked.get(1).map_or(0.0, |candidate| candidate.score);

        let mut warnings = Vec::new();
        if !metrics.has_time() {
            tracing::warn!("gpu time unresolved or non-positive; halving confidence");
            warnings.push(if schema.is_resolved(MetricId::GpuTime) {
                "GPU time is missing or non-positive for this row; confidence halved.".to_string()
            } else {
                "No GPU time column in this capture; confidence halved.".to_string()
            });
        }
        if !metrics.cache_known() {
            warnings.push("Cache hit rates unavailable; cache-sensitive rules ignore them.".to_string());
        }

        let breakdown = self.confidence(score, runner_up, schema.coverage(), metrics.has_time());

        let mut evidence = chosen.evidence(&signals);
        evidence.truncate(self.config.max_evidence);
        let mut remediation = chosen.remediation(&signals);
        remediation.truncate(self.config.max_remediation);

        let signal_summaries = metrics
            .stalls
            .top(self.config.top_stalls)
            .into_iter()
            .map(|(reason, value)| SignalSummary {
                key: reason.as_str(),
                label: reason.label(),
                value,
            })
            .collect();

        let candidates = ranked
            .iter()
            .map(|candidate| RankedCandidate {
                hypothesis: candidate.hypothesis.id(),
                title: candidate.hypothesis.title(&signals),
                score: candidate.score,
            })
            .collect();

        tracing::debug!(
            hypothesis = chosen.id().as_str(),
            score,
            confidence = breakdown.raw * breakdown.time_factor,
            "classified row"
        );

        ClassificationResult {
            hypothesis: chosen.id(),
            title: chosen.title(&signals),
            score,
            confidence: clamp01(breakdown.raw * breakdown.time_factor),
            confidence_breakdown: breakdown,
            evidence,
            check: chosen.check().to_string(),
            remediation,
            signals: signal_summaries,
            candidates,
            stage: metrics.stage,
            coverage: schema.coverage(),
            unresolved: schema.unresolved().to_vec(),
            warnings,
        }
    }

    fn confidence(
        &self,
        best: f64,
        runner_up: f64,
        coverage: f64,
        has_time: bool,
    ) -> ConfidenceBreakdown {
        let weights = &self.config.confidence;
        let penalty = (runner_up * weights.runner_up_weight).min(weights.runner_up_cap);
        let raw = clamp01(best * weights.best_weight + coverage * weights.coverage_weight - penalty);
        ConfidenceBreakdown {
            best,
            runner_up,
            coverage,
            raw,
            time_factor: if has_time {
                1.0
            } else {
                weights.missing_time_factor
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BoundClassifier;
    use crate::config::ClassifierConfig;
    use crate::hypothesis::HypothesisId;
    use gpubound_core::{
        CaptureBaselines, DerivedMetrics, MetricCatalog, ResolvedSchema, StallBreakdown,
        StallReason,
    };

    fn schema(headers: &[&str]) -> ResolvedSchema {
        ResolvedSchema::resolve(MetricCatalog::standard(), headers)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ClassifierConfig {
            min_score: 1.5,
            ..ClassifierConfig::default()
        };
        assert!(BoundClassifier::new(config).is_err());
    }

    #[test]
    fn no_candidates_falls_back_with_fixed_score() {
        let classifier = BoundClassifier::new(ClassifierConfig::default()).expect("defaults are valid");
        let result = classifier.classify_metrics(
            &DerivedMetrics::undefined(),
            &CaptureBaselines::default(),
            &schema(&[]),
        );
        assert_eq!(result.hypothesis, HypothesisId::INSUFFICIENT_DATA);
        assert_eq!(result.score, 0.12);
        assert!(result.is_fallback());
        assert_eq!(result.confidence_breakdown.time_factor, 0.5);
        assert_eq!(result.coverage, 0.0);
    }

    #[test]
    fn confidence_matches_documented_formula() {
        let classifier = BoundClassifier::new(ClassifierConfig::default()).expect("defaults are valid");
        let mut metrics = DerivedMetrics::undefined();
        metrics.time_ns = 1000.0;
        metrics.stalls = StallBreakdown::from_values([
            (StallReason::MathThrottle, 0.40),
            (StallReason::Branch, 0.16),
        ]);
        let schema = schema(&["gpu__time_duration.sum", "sm__inst_executed.sum"]);
        let result = classifier.classify_metrics(&metrics, &CaptureBaselines::default(), &schema);

        assert_eq!(result.hypothesis, HypothesisId::ALU);
        assert_eq!(result.score, 1.0);
        let runner_up = result.runner_up().expect("branch should also qualify");
        assert_eq!(runner_up.hypothesis, HypothesisId::BRANCH_DIVERGENCE);
        let expected = (1.0 * 0.85 + schema.coverage() * 0.25 - (runner_up.score * 0.35).min(0.25))
            .clamp(0.0, 1.0);
        assert!((result.confidence - expected).abs() < 1e-12);
        assert!(result.warnings.iter().any(|w| w.contains("Cache hit rates")));
    }

    #[test]
    fn top_stalls_are_reported_in_descending_order() {
        let classifier = BoundClassifier::new(ClassifierConfig::default()).expect("defaults are valid");
        let mut metrics = DerivedMetrics::undefined();
        metrics.stalls = StallBreakdown::from_values([
            (StallReason::Wait, 0.05),
            (StallReason::Barrier, 0.20),
            (StallReason::Membar, 0.10),
            (StallReason::Dispatch, 0.01),
        ]);
        let result = classifier.classify_metrics(&metrics, &CaptureBaselines::default(), &schema(&[]));
        let keys = result.signals.iter().map(|s| s.key).collect::<Vec<_>>();
        assert_eq!(keys, vec!["barrier", "membar", "wait"]);
    }
}
