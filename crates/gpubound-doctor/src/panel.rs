// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Host-facing registration contract for the bound detector.

use crate::cache::BaselineCache;
use crate::classifier::BoundClassifier;
use crate::result::{ClassificationResult, Diagnosis};
use gpubound_core::{Capture, CounterRow, MetricCatalog};

/// Static registration data a host uses to list and order panels.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub order: u32,
}

/// One diagnosis request from the host.
#[derive(Clone, Copy, Debug)]
pub struct PanelRequest<'a> {
    pub selection: Option<usize>,
    /// Host-aggregated counters for the selection; replaces the row values.
    pub aggregated: Option<&'a CounterRow>,
    pub capture: &'a Capture,
}

impl<'a> PanelRequest<'a> {
    pub fn new(capture: &'a Capture, selection: Option<usize>) -> Self {
        Self {
            selection,
            aggregated: None,
            capture,
        }
    }

    pub fn with_aggregated(mut self, row: &'a CounterRow) -> Self {
        self.aggregated = Some(row);
        self
    }
}

pub trait DiagnosticPanel: Send + Sync {
    type Report;

    fn descriptor(&self) -> PanelDescriptor;

    fn diagnose(&self, request: PanelRequest<'_>) -> Diagnosis<Self::Report>;
}

/// Placeholder diagnoses shared by every panel: the row to diagnose, or the
/// reason there is none.
pub(crate) fn select_row<'a, R>(request: &PanelRequest<'a>) -> Result<&'a CounterRow, Diagnosis<R>> {
    let Some(index) = request.selection else {
        return Err(Diagnosis::NoSelection);
    };
    let capture = request.capture;
    if capture.is_empty() {
        return Err(Diagnosis::EmptyCapture);
    }
    let Some(selected) = capture.row(index) else {
        tracing::warn!(index, rows = capture.len(), "selection outside capture");
        return Err(Diagnosis::SelectionOutOfRange {
            index,
            rows: capture.len(),
        });
    };
    Ok(request.aggregated.unwrap_or(selected))
}

pub const BOUND_DETECTOR_DESCRIPTOR: PanelDescriptor = PanelDescriptor {
    id: "bound-detector-advanced",
    name: "BoundDetectorAdvanced",
    description: "Ranks likely GPU bottlenecks for the selected event from performance counters.",
    order: 2,
};

/// Panel backed by a [`BoundClassifier`] and a per-capture baseline cache.
#[derive(Debug)]
pub struct BoundDetectorPanel {
    classifier: BoundClassifier,
    catalog: &'static MetricCatalog,
    cache: BaselineCache,
}

impl BoundDetectorPanel {
    pub fn new(classifier: BoundClassifier) -> Self {
        Self::with_catalog(classifier, MetricCatalog::standard())
    }

    pub fn with_catalog(classifier: BoundClassifier, catalog: &'static MetricCatalog) -> Self {
        Self {
            classifier,
            catalog,
            cache: BaselineCache::new(),
        }
    }

    pub fn classifier(&self) -> &BoundClassifier {
        &self.classifier
    }

    pub fn cache(&self) -> &BaselineCache {
        &self.cache
    }
}

impl DiagnosticPanel for BoundDetectorPanel {
    type Report = ClassificationResult;

    fn descriptor(&self) -> PanelDescriptor {
        BOUND_DETECTOR_DESCRIPTOR
    }

    fn diagnose(&self, request: PanelRequest<'_>) -> Diagnosis<ClassificationResult> {
        let row = match select_row(&request) {
            Ok(row) => row,
            Err(placeholder) => return placeholder,
        };
        let context = self.cache.get_or_compute(request.capture, self.catalog);
        Diagnosis::Classified(Box::new(self.classifier.classify(&context, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundDetectorPanel, DiagnosticPanel, PanelRequest};
    use crate::classifier::BoundClassifier;
    use crate::config::ClassifierConfig;
    use crate::hypothesis::HypothesisId;
    use crate::result::Diagnosis;
    use gpubound_core::{Capture, CounterRow};

    fn panel() -> BoundDetectorPanel {
        BoundDetectorPanel::new(BoundClassifier::new(ClassifierConfig::default()).expect("defaults are valid"))
    }

    fn capture() -> Capture {
        let headers = ["gpu__time_duration.sum", "gpu__time_active.sum"];
        Capture::new(
            headers.iter().map(|h| (*h).to_string()).collect(),
            vec![
                CounterRow::from_pairs([(headers[0], 100.0), (headers[1], 95.0)]),
                CounterRow::from_pairs([(headers[0], 100.0), (headers[1], 95.0)]),
            ],
        )
        .expect("capture should build")
    }

    #[test]
    fn descriptor_is_stable() {
        let descriptor = panel().descriptor();
        assert_eq!(descriptor.id, "bound-detector-advanced");
        assert_eq!(descriptor.order, 2);
    }

    #[test]
    fn placeholders_for_missing_or_invalid_selection() {
        let panel = panel();
        let capture = capture();
        assert_eq!(panel.diagnose(PanelRequest::new(&capture, None)), Diagnosis::NoSelection);
        assert_eq!(
            panel.diagnose(PanelRequest::new(&capture, Some(5))),
            Diagnosis::SelectionOutOfRange { index: 5, rows: 2 }
        );

        let empty = Capture::new(Vec::new(), Vec::new()).expect("empty capture is valid");
        assert_eq!(panel.diagnose(PanelRequest::new(&empty, Some(0))), Diagnosis::EmptyCapture);
    }

    #[test]
    fn aggregated_row_replaces_selected_values() {
        let panel = panel();
        let capture = capture();
        let busy = panel.diagnose(PanelRequest::new(&capture, Some(0)));
        assert_ne!(
            busy.result().map(|r| r.hypothesis),
            Some(HypothesisId::GPU_IDLE)
        );

        let aggregated = CounterRow::from_pairs([
            ("gpu__time_duration.sum", 100.0),
            ("gpu__time_active.sum", 20.0),
        ]);
        let idle = panel.diagnose(PanelRequest::new(&capture, Some(0)).with_aggregated(&aggregated));
        assert_eq!(idle.result().map(|r| r.hypothesis), Some(HypothesisId::GPU_IDLE));
        assert_eq!(panel.cache().current_id(), Some(capture.id()));
    }
}
