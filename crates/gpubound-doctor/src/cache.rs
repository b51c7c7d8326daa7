// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gpubound_core::{Capture, CaptureBaselines, CaptureId, MetricCatalog, ResolvedSchema};
use std::sync::{Arc, PoisonError, RwLock};

/// Per-capture state shared by every row classification: the resolved schema
/// and the capture-wide baselines.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureContext {
    pub capture_id: CaptureId,
    pub schema: ResolvedSchema,
    pub baselines: CaptureBaselines,
}

impl CaptureContext {
    pub fn build(capture: &Capture, catalog: &MetricCatalog) -> Self {
        let schema = ResolvedSchema::resolve(catalog, capture.headers());
        let baselines = CaptureBaselines::compute(capture, &schema);
        Self {
            capture_id: capture.id(),
            schema,
            baselines,
        }
    }
}

/// Holds the context of the most recently seen capture.
///
/// Readers share the cached `Arc`; a different capture identity replaces it.
#[derive(Debug, Default)]
pub struct BaselineCache {
    slot: RwLock<Option<Arc<CaptureContext>>>,
}

impl BaselineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&self, capture: &Capture, catalog: &MetricCatalog) -> Arc<CaptureContext> {
        {
            let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(context) = slot.as_ref()
                && context.capture_id == capture.id()
            {
                return Arc::clone(context);
            }
        }

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have filled the slot while we waited.
        if let Some(context) = slot.as_ref()
            && context.capture_id == capture.id()
        {
            return Arc::clone(context);
        }

        tracing::debug!(capture = capture.id().get(), rows = capture.len(), "rebuilding capture context");
        let context = Arc::new(CaptureContext::build(capture, catalog));
        *slot = Some(Arc::clone(&context));
        context
    }

    pub fn current_id(&self) -> Option<CaptureId> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|context| context.capture_id)
    }

    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
