// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::{BoundError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CAPTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a loaded capture.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(u64);

impl CaptureId {
    fn next() -> Self {
        Self(NEXT_CAPTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// One recorded GPU event (draw or dispatch): raw column name to value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterRow {
    values: BTreeMap<String, f64>,
}

impl CounterRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut row = Self::new();
        for (name, value) in pairs {
            row.insert(name, value);
        }
        row
    }

    /// Stores a cell. Non-finite values are dropped so they read back as absent.
    pub fn insert(&mut self, column: impl Into<String>, value: f64) {
        if value.is_finite() {
            self.values.insert(column.into(), value);
        }
    }

    /// Finite value of `column`, or `None` when the cell is missing.
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

/// Read-only counter table for one capture.
#[derive(Clone, Debug)]
pub struct Capture {
    id: CaptureId,
    headers: Vec<String>,
    rows: Vec<CounterRow>,
}

impl Capture {
    /// Builds a capture, rejecting duplicate header names.
    pub fn new(headers: Vec<String>, rows: Vec<CounterRow>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for (idx, header) in headers.iter().enumerate() {
            let trimmed = header.trim();
            if !seen.insert(trimmed) {
                return Err(BoundError::invalid_input(format!(
                    "duplicate header '{trimmed}' at column {}",
                    idx + 1
                )));
            }
        }

        Ok(Self {
            id: CaptureId::next(),
            headers,
            rows,
        })
    }

    pub fn id(&self) -> CaptureId {
        self.id
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[CounterRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&CounterRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capture, CounterRow};

    #[test]
    fn counter_row_drops_non_finite_cells() {
        let row = CounterRow::from_pairs([("a", 1.0), ("b", f64::NAN), ("c", f64::INFINITY)]);
        assert_eq!(row.get("a"), Some(1.0));
        assert_eq!(row.get("b"), None);
        assert_eq!(row.get("c"), None);
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn capture_rejects_duplicate_headers_after_trimming() {
        let err = Capture::new(vec!["a".into(), " a ".into()], vec![])
            .expect_err("duplicate headers should fail");
        assert!(err.to_string().contains("duplicate header 'a'"));
    }

    #[test]
    fn captures_receive_distinct_ids() {
        let a = Capture::new(vec!["x".into()], vec![]).expect("capture should build");
        let b = Capture::new(vec!["x".into()], vec![]).expect("capture should build");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn row_lookup_is_bounds_checked() {
        let capture = Capture::new(
            vec!["x".into()],
            vec![CounterRow::from_pairs([("x", 2.0)])],
        )
        .expect("capture should build");
        assert_eq!(capture.row(0).and_then(|row| row.get("x")), Some(2.0));
        assert!(capture.row(1).is_none());
        assert_eq!(capture.len(), 1);
    }
}
