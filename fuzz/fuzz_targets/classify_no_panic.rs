// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use gpubound_core::{Capture, CounterRow, MetricCatalog, catalog_names};
use gpubound_doctor::{
    BoundDetectorPanel, BoundClassifier, ClassifierConfig, Diagnosis, DiagnosticPanel,
    PanelRequest, ShaderXrayPanel,
};
use libfuzzer_sys::fuzz_target;

fn build_value(cursor: &mut common::ByteCursor<'_>) -> f64 {
    match cursor.next_u8() % 8 {
        0 => 0.0,
        1 => f64::NAN,
        2 => f64::INFINITY,
        3 => -f64::from(cursor.next_u16()),
        4 => f64::from(cursor.next_u8()) / 255.0,
        5 => f64::from(cursor.next_u8()),
        6 => f64::from(cursor.next_u16()) * 1.0e3,
        _ => cursor.next_f64(),
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let names = catalog_names(MetricCatalog::standard());

    let column_count = common::bounded(cursor.next_u8(), 0, 24);
    let mut headers = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        let name = &names[usize::from(cursor.next_u8()) % names.len()];
        if !headers.contains(name) {
            headers.push(name.clone());
        }
    }

    let row_count = common::bounded(cursor.next_u8(), 0, 16);
    let rows = (0..row_count)
        .map(|_| {
            let mut row = CounterRow::new();
            for header in &headers {
                if cursor.next_u8() % 5 != 0 {
                    row.insert(header.as_str(), build_value(&mut cursor));
                }
            }
            row
        })
        .collect::<Vec<_>>();

    let Ok(capture) = Capture::new(headers, rows) else {
        return;
    };
    let Ok(classifier) = BoundClassifier::new(ClassifierConfig::default()) else {
        return;
    };
    let panel = BoundDetectorPanel::new(classifier);

    let selection = match cursor.next_u8() % 4 {
        0 => None,
        _ => Some(usize::from(cursor.next_u8()) % (row_count + 2)),
    };
    if let Diagnosis::Classified(result) = panel.diagnose(PanelRequest::new(&capture, selection)) {
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!((0.0..=1.0).contains(&result.score));
        assert!(result.evidence.len() <= 8);
    }
    if let Diagnosis::Classified(report) =
        ShaderXrayPanel::default().diagnose(PanelRequest::new(&capture, selection))
    {
        assert!((0.0..=1.0).contains(&report.confidence));
        assert!(report.top_stalls.len() <= 6);
    }
});
