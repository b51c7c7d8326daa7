// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::capture::CounterRow;
use crate::catalog::{MetricCatalog, MetricDefinition, MetricId, MetricKind, Spelling, TimeUnit};
use std::collections::BTreeMap;

/// Strips one trailing whitespace-preceded parenthesized annotation:
/// `"GPU Duration (ms)"` becomes `"GPU Duration"`.
pub fn strip_unit_suffix(name: &str) -> &str {
    let trimmed = name.trim_end();
    if !trimmed.ends_with(')') {
        return trimmed;
    }
    let Some(open) = trimmed.rfind('(') else {
        return trimmed;
    };
    let head = &trimmed[..open];
    if !head.ends_with(char::is_whitespace) {
        return trimmed;
    }
    head.trim_end()
}

/// Trimmed, unit-stripped, lower-cased form of a column name.
pub fn normalize_column_name(name: &str) -> String {
    strip_unit_suffix(name.trim()).trim().to_lowercase()
}

fn unit_annotation(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let stripped = strip_unit_suffix(trimmed);
    if stripped.len() == trimmed.len() {
        return None;
    }
    let open = trimmed.rfind('(')?;
    Some(trimmed[open + 1..trimmed.len() - 1].trim().to_lowercase())
}

/// Factor converting a time column to nanoseconds. An explicit unit annotation
/// on the column wins over the unit tag of the spelling that matched it.
fn time_scale(column: &str, spelling: &Spelling) -> f64 {
    if let Some(unit) = unit_annotation(column) {
        match unit.as_str() {
            "ns" => return 1.0,
            "us" | "µs" => return 1.0e3,
            "ms" => return TimeUnit::Milliseconds.to_nanoseconds(),
            "s" => return 1.0e9,
            _ => {}
        }
    }
    if column.trim().to_lowercase().ends_with(" ms") {
        return TimeUnit::Milliseconds.to_nanoseconds();
    }
    spelling.unit.map_or(1.0, TimeUnit::to_nanoseconds)
}

/// A logical metric bound to one concrete column of the current capture.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedColumn {
    pub metric: MetricId,
    pub kind: MetricKind,
    pub column: String,
    pub matched_spelling: String,
    /// Multiplier to the canonical unit (nanoseconds for time metrics).
    pub scale: f64,
}

impl ResolvedColumn {
    /// Canonical-unit value of this column in `row`, `NaN` when the cell is missing.
    pub fn value(&self, row: &CounterRow) -> f64 {
        row.get(&self.column)
            .map_or(f64::NAN, |value| value * self.scale)
    }
}

/// Lookup over the column names present in one capture.
#[derive(Clone, Debug, Default)]
pub struct ColumnResolver {
    exact: BTreeMap<String, String>,
    lower: BTreeMap<String, String>,
    stripped: BTreeMap<String, String>,
}

fn insert_smallest(map: &mut BTreeMap<String, String>, key: String, column: &str) {
    match map.get(&key) {
        Some(existing) if existing.as_str() <= column => {}
        _ => {
            map.insert(key, column.to_string());
        }
    }
}

impl ColumnResolver {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut resolver = Self::default();
        for column in columns {
            let column = column.as_ref();
            let trimmed = column.trim();
            if trimmed.is_empty() {
                continue;
            }
            insert_smallest(&mut resolver.exact, trimmed.to_string(), column);
            insert_smallest(&mut resolver.lower, trimmed.to_lowercase(), column);
            insert_smallest(&mut resolver.stripped, normalize_column_name(trimmed), column);
        }
        resolver
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.exact
            .get(key)
            .or_else(|| self.lower.get(key))
            .or_else(|| self.stripped.get(key))
            .map(String::as_str)
    }

    fn match_spelling(&self, spelling: &str) -> Option<&str> {
        let trimmed = spelling.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.lookup(trimmed)
            .or_else(|| self.lookup(&trimmed.to_lowercase()))
            .or_else(|| self.lookup(&normalize_column_name(trimmed)))
    }

    /// First spelling of `definition` (in listed order) present in the capture.
    pub fn resolve(&self, definition: &MetricDefinition) -> Option<ResolvedColumn> {
        for spelling in &definition.spellings {
            let Some(column) = self.match_spelling(&spelling.name) else {
                continue;
            };
            let scale = if definition.kind == MetricKind::Time {
                time_scale(column, spelling)
            } else {
                1.0
            };
            return Some(ResolvedColumn {
                metric: definition.id,
                kind: definition.kind,
                column: column.to_string(),
                matched_spelling: spelling.name.clone(),
                scale,
            });
        }
        None
    }
}

/// Resolution of a whole catalog against one capture schema.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSchema {
    columns: BTreeMap<MetricId, ResolvedColumn>,
    unresolved: Vec<MetricId>,
    catalog_len: usize,
}

impl ResolvedSchema {
    pub fn resolve<S: AsRef<str>>(catalog: &MetricCatalog, headers: &[S]) -> Self {
        let resolver = ColumnResolver::new(headers);
        let mut columns = BTreeMap::new();
        let mut unresolved = Vec::new();

        for definition in catalog.definitions() {
            match resolver.resolve(definition) {
                Some(column) => {
                    tracing::trace!(
                        metric = definition.id.as_str(),
                        column = column.column.as_str(),
                        scale = column.scale,
                        "resolved metric"
                    );
                    columns.insert(definition.id, column);
                }
                None => unresolved.push(definition.id),
            }
        }

        tracing::debug!(
            resolved = columns.len(),
            unresolved = unresolved.len(),
            "resolved capture schema"
        );

        Self {
            columns,
            unresolved,
            catalog_len: catalog.len(),
        }
    }

    pub fn column(&self, id: MetricId) -> Option<&ResolvedColumn> {
        self.columns.get(&id)
    }

    pub fn is_resolved(&self, id: MetricId) -> bool {
        self.columns.contains_key(&id)
    }

    /// Canonical-unit value of `id` in `row`; `NaN` if unresolved or missing.
    pub fn value(&self, row: &CounterRow, id: MetricId) -> f64 {
        self.column(id).map_or(f64::NAN, |column| column.value(row))
    }

    /// Metrics with no matching column, in catalog order.
    pub fn unresolved(&self) -> &[MetricId] {
        &self.unresolved
    }

    pub fn resolved_count(&self) -> usize {
        self.columns.len()
    }

    /// Fraction of the catalog resolved to a column.
    pub fn coverage(&self) -> f64 {
        if self.catalog_len == 0 {
            return 1.0;
        }
        (self.columns.len() as f64 / self.catalog_len as f64).clamp(0.0, 1.0)
    }
}
