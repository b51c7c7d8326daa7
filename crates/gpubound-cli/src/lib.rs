// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gpubound_core::{BoundError, Capture, CounterRow};
use gpubound_doctor::ClassifierConfig;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CaptureDocument {
    #[serde(default)]
    headers: Option<Vec<String>>,
    counters: Vec<serde_json::Map<String, Value>>,
}

/// Loads a capture from `.json` or `.csv`, chosen by extension.
pub fn load_capture(path: &Path) -> Result<Capture, BoundError> {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .ok_or_else(|| {
            BoundError::not_supported(format!(
                "unable to infer capture format for '{}'; expected .json or .csv",
                path.display()
            ))
        })?;

    let raw = fs::read_to_string(path)
        .map_err(|source| BoundError::io(format!("failed to read '{}'", path.display()), source))?;

    match extension.as_str() {
        "json" => parse_capture_json(raw.as_str()),
        "csv" => parse_capture_csv(raw.as_str()),
        other => Err(BoundError::not_supported(format!(
            "unsupported capture extension '.{other}'; expected .json or .csv"
        ))),
    }
}

/// Parses `{"headers": [...], "counters": [{name: number}]}`. Without
/// `headers`, columns are taken from the counters in first-seen order, keys
/// within a row in document order.
/// Non-numeric cells read as missing.
pub fn parse_capture_json(raw: &str) -> Result<Capture, BoundError> {
    let document: CaptureDocument =
        serde_json::from_str(raw).map_err(|source| BoundError::json("invalid capture JSON", source))?;

    let headers = match document.headers {
        Some(headers) => headers,
        None => {
            let mut seen = BTreeSet::new();
            let mut headers = Vec::new();
            for counters in &document.counters {
                for name in counters.keys() {
                    if seen.insert(name.as_str()) {
                        headers.push(name.clone());
                    }
                }
            }
            headers
        }
    };

    let rows = document
        .counters
        .iter()
        .map(|counters| {
            let mut row = CounterRow::new();
            for (name, value) in counters {
                if let Some(number) = value.as_f64() {
                    row.insert(name.as_str(), number);
                }
            }
            row
        })
        .collect();

    Capture::new(headers, rows)
}

fn split_csv_line(line: &str) -> Vec<&str> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').trim())
        .collect()
}

/// Parses a header row followed by numeric rows. Short rows leave trailing
/// cells missing; non-numeric cells read as missing.
pub fn parse_capture_csv(raw: &str) -> Result<Capture, BoundError> {
    let mut lines = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| BoundError::invalid_input("CSV capture is empty"))?;
    let headers = split_csv_line(header_line)
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (row_idx, line) in lines.enumerate() {
        let cells = split_csv_line(line);
        if cells.len() > headers.len() {
            return Err(BoundError::invalid_input(format!(
                "CSV row {} has {} columns but the header has {}",
                row_idx + 2,
                cells.len(),
                headers.len()
            )));
        }
        let mut row = CounterRow::new();
        for (header, cell) in headers.iter().zip(cells) {
            if let Ok(value) = cell.parse::<f64>() {
                row.insert(header.as_str(), value);
            }
        }
        rows.push(row);
    }

    Capture::new(headers, rows)
}

/// Reads a (possibly partial) classifier configuration and validates it.
pub fn load_config(path: &Path) -> Result<ClassifierConfig, BoundError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| BoundError::io(format!("failed to read '{}'", path.display()), source))?;
    let config: ClassifierConfig = serde_json::from_str(raw.as_str())
        .map_err(|source| BoundError::json(format!("invalid config '{}'", path.display()), source))?;
    config.validate()?;
    Ok(config)
}

/// Reads counter names one per line, skipping blanks.
pub fn load_counter_names(path: &Path) -> Result<Vec<String>, BoundError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| BoundError::io(format!("failed to read '{}'", path.display()), source))?;
    Ok(gpubound_core::parse_names(raw.as_str()))
}
