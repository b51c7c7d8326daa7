// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Performance-counter settings files for the capture tool, so a capture can
//! be recorded with exactly the counters the catalog knows about.

use crate::catalog::MetricCatalog;

const COUNTER_PREFIX: [u32; 3] = [632_693_968, 858_015_015, 2_675_035_495];
const COUNTER_KEY_XOR: u32 = 0x61B3_7980;
const DJB2_SEED: u32 = 5381;

/// `h = h * 33 + byte` over the UTF-8 bytes of `name`, wrapping at 32 bits.
pub fn djb2(name: &str) -> u32 {
    name.bytes().fold(DJB2_SEED, |hash, byte| {
        hash.wrapping_mul(33).wrapping_add(u32::from(byte))
    })
}

pub fn counter_entry(name: &str) -> [u32; 4] {
    [
        COUNTER_PREFIX[0],
        COUNTER_PREFIX[1],
        COUNTER_PREFIX[2],
        COUNTER_KEY_XOR ^ djb2(name),
    ]
}

/// Metric names from a text listing: one per line, trimmed, blanks skipped.
pub fn parse_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Preferred spelling of every catalog metric, in catalog order.
pub fn catalog_names(catalog: &MetricCatalog) -> Vec<String> {
    catalog
        .definitions()
        .iter()
        .filter_map(|definition| definition.preferred_spelling())
        .map(str::to_string)
        .collect()
}

/// Renders the settings document. The layout (four-space indent, one integer
/// per line, trailing newline) is what the capture tool writes itself.
pub fn render_settings<S: AsRef<str>>(names: &[S]) -> String {
    let mut out = String::from("{\n    \"counters\": [\n");
    for (idx, name) in names.iter().enumerate() {
        out.push_str("        [\n");
        let entry = counter_entry(name.as_ref());
        for (pos, value) in entry.iter().enumerate() {
            let comma = if pos + 1 < entry.len() { "," } else { "" };
            out.push_str(&format!("            {value}{comma}\n"));
        }
        let comma = if idx + 1 < names.len() { "," } else { "" };
        out.push_str(&format!("        ]{comma}\n"));
    }
    out.push_str("    ],\n    \"rdocPerformanceCounterSettings\": 1\n}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::{catalog_names, counter_entry, djb2, parse_names, render_settings};
    use crate::catalog::MetricCatalog;

    #[test]
    fn djb2_matches_reference_values() {
        assert_eq!(djb2(""), 5381);
        assert_eq!(djb2("a"), 177_670);
    }

    #[test]
    fn counter_entry_keeps_prefix_and_xors_hash() {
        assert_eq!(
            counter_entry("gpu__time_duration.sum"),
            [632_693_968, 858_015_015, 2_675_035_495, 2_766_909_862]
        );
    }

    #[test]
    fn render_settings_uses_one_integer_per_line() {
        let rendered = render_settings(&["a"]);
        assert_eq!(
            rendered,
            "{\n    \"counters\": [\n        [\n            632693968,\n            858015015,\n            2675035495,\n            1639042950\n        ]\n    ],\n    \"rdocPerformanceCounterSettings\": 1\n}\n"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn render_settings_with_no_names_is_still_valid_json() {
        let rendered = render_settings::<&str>(&[]);
        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("settings should be valid JSON");
        assert_eq!(parsed["counters"], serde_json::json!([]));
        assert_eq!(parsed["rdocPerformanceCounterSettings"], 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn multiple_entries_separate_with_commas() {
        let rendered = render_settings(&["a", "b"]);
        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("settings should be valid JSON");
        assert_eq!(parsed["counters"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn parse_names_trims_and_skips_blank_lines() {
        let names = parse_names("  sm__inst_executed.sum \n\n\t\nSamples Passed\r\n");
        assert_eq!(names, vec!["sm__inst_executed.sum", "Samples Passed"]);
    }

    #[test]
    fn catalog_export_lists_preferred_spellings_in_order() {
        let names = catalog_names(MetricCatalog::standard());
        assert_eq!(names.len(), MetricCatalog::standard().len());
        assert_eq!(names[0], "gpu__time_duration.sum");
    }
}
