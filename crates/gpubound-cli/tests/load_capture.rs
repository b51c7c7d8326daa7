// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gpubound_cli::{load_capture, load_config};
use std::fs;
use std::path::PathBuf;

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gpubound-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("temp dir should be writable");
    let path = dir.join(name);
    fs::write(&path, contents).expect("scratch file should be writable");
    path
}

#[test]
fn loads_json_and_csv_by_extension() {
    let json = scratch_file(
        "capture.json",
        r#"{"headers": ["gpu__time_duration.sum"], "counters": [{"gpu__time_duration.sum": 12.5}]}"#,
    );
    let csv = scratch_file("capture.csv", "gpu__time_duration.sum\n12.5\n");

    let from_json = load_capture(&json).expect("json capture should load");
    let from_csv = load_capture(&csv).expect("csv capture should load");
    assert_eq!(from_json.headers(), from_csv.headers());
    assert_eq!(from_json.rows(), from_csv.rows());
    assert_ne!(from_json.id(), from_csv.id());
}

#[test]
fn unknown_extension_is_not_supported() {
    let path = scratch_file("capture.bin", "");
    let err = load_capture(&path).expect_err("binary captures are not supported");
    assert_eq!(err.code(), "not_supported");
}

#[test]
fn missing_file_reports_io_error() {
    let path = std::env::temp_dir().join("gpubound-cli-does-not-exist.json");
    let err = load_capture(&path).expect_err("missing file must fail");
    assert_eq!(err.code(), "io_error");
}

#[test]
fn config_files_are_validated() {
    let valid = scratch_file("partial.json", r#"{"texture": {"vtg_factor": 0.5}}"#);
    let config = load_config(&valid).expect("partial override should load");
    assert_eq!(config.texture.vtg_factor, 0.5);
    assert_eq!(config.min_score, 0.18);

    let invalid = scratch_file("invalid.json", r#"{"idle": {"active_ratio": {"low": 0.5, "high": 0.5}}}"#);
    let err = load_config(&invalid).expect_err("degenerate ramp must fail");
    assert_eq!(err.code(), "invalid_input");

    let unknown = scratch_file("unknown.json", r#"{"min_scroe": 0.3}"#);
    let err = load_config(&unknown).expect_err("misspelled key must fail");
    assert_eq!(err.code(), "json_error");
}
