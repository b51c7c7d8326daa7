// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gpubound_cli::{load_capture, load_config, load_counter_names};
use gpubound_core::{BoundError, Capture, MetricCatalog, catalog_names, render_settings};
use gpubound_doctor::{
    BoundClassifier, BoundDetectorPanel, CaptureContext, ClassificationResult, ClassifierConfig,
    Diagnosis, DiagnosticPanel, HypothesisId, PanelRequest, ShaderXrayPanel, StallReport,
    confidence_formula,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;

struct Cli {
    logging: LoggingArgs,
    command: Command,
}

enum Command {
    Classify(ClassifyArgs),
    Xray(XrayArgs),
    Scan(ScanArgs),
    Counters(CountersArgs),
    Config(ConfigArgs),
}

#[derive(Debug)]
struct LoggingArgs {
    level: String,
    format: LogFormat,
}

impl Default for LoggingArgs {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self, CliError> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(CliError::invalid_input(format!(
                "invalid --log-format '{raw}'; expected one of: compact, json"
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct ClassifyArgs {
    input: PathBuf,
    row: usize,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct XrayArgs {
    input: PathBuf,
    row: usize,
    output: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct ScanArgs {
    input: PathBuf,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum CounterSource {
    Names(PathBuf),
    Catalog,
}

#[derive(Debug)]
struct CountersArgs {
    source: CounterSource,
    output: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct ConfigArgs {
    output: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Bound(#[from] BoundError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Bound(err) => err.code(),
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

#[derive(Debug, Serialize)]
struct InputSummary {
    path: String,
    rows: usize,
    columns: usize,
}

impl InputSummary {
    fn new(path: &Path, capture: &Capture) -> Self {
        Self {
            path: path.display().to_string(),
            rows: capture.len(),
            columns: capture.headers().len(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClassifyOutput<'a> {
    input: InputSummary,
    row: usize,
    confidence_formula: &'static str,
    result: &'a ClassificationResult,
}

#[derive(Debug, Serialize)]
struct XrayOutput<'a> {
    input: InputSummary,
    row: usize,
    report: &'a StallReport,
}

#[derive(Debug, Serialize)]
struct ScanRowOutput {
    row: usize,
    hypothesis: HypothesisId,
    title: String,
    score: f64,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    input: InputSummary,
    coverage: f64,
    rows: Vec<ScanRowOutput>,
    counts: BTreeMap<HypothesisId, usize>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let Some(cli) = parse_cli(env::args().skip(1).collect())? else {
        return Ok(());
    };
    init_tracing(&cli.logging);

    match cli.command {
        Command::Classify(args) => handle_classify(args),
        Command::Xray(args) => handle_xray(args),
        Command::Scan(args) => handle_scan(args),
        Command::Counters(args) => handle_counters(args),
        Command::Config(args) => handle_config(args),
    }
}

fn init_tracing(logging: &LoggingArgs) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.as_str()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }
}

/// Splits global logging flags from the command tokens.
fn take_logging_args(args: Vec<String>) -> Result<(LoggingArgs, Vec<String>), CliError> {
    let mut logging = LoggingArgs::default();
    let mut rest = Vec::with_capacity(args.len());
    let mut idx = 0usize;
    while idx < args.len() {
        let (flag, inline_value) = match args[idx].as_str() {
            token if token.starts_with("--") => split_flag(token)?,
            _ => {
                rest.push(args[idx].clone());
                idx += 1;
                continue;
            }
        };
        match flag {
            "--log-level" => {
                logging.level = take_flag_value(flag, inline_value, &args, &mut idx)?;
            }
            "--log-format" => {
                let raw = take_flag_value(flag, inline_value, &args, &mut idx)?;
                logging.format = LogFormat::parse(raw.as_str())?;
            }
            _ => rest.push(args[idx].clone()),
        }
        idx += 1;
    }
    Ok((logging, rest))
}

fn parse_cli(args: Vec<String>) -> Result<Option<Cli>, CliError> {
    let (logging, args) = take_logging_args(args)?;
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].as_str();
    let rest = &args[1..];
    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name)?;
        return Ok(None);
    }

    let command = match command_name {
        "classify" => Command::Classify(parse_classify_args(rest)?),
        "xray" => Command::Xray(parse_xray_args(rest)?),
        "scan" => Command::Scan(parse_scan_args(rest)?),
        "counters" => Command::Counters(parse_counters_args(rest)?),
        "config" => Command::Config(parse_config_args(rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: classify, xray, scan, counters, config"
            )));
        }
    };

    Ok(Some(Cli { logging, command }))
}

fn parse_classify_args(tokens: &[String]) -> Result<ClassifyArgs, CliError> {
    let mut args = ClassifyArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                args.input = PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?);
            }
            "--row" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.row = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--config" => {
                args.config = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
            }
            "--output" => {
                args.output = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown classify option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("classify requires --input <path>"));
    }
    Ok(args)
}

fn parse_xray_args(tokens: &[String]) -> Result<XrayArgs, CliError> {
    let mut args = XrayArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                args.input = PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?);
            }
            "--row" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.row = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--output" => {
                args.output = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
            }
            other => {
                return Err(CliError::invalid_input(format!("unknown xray option '{other}'")));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("xray requires --input <path>"));
    }
    Ok(args)
}

fn parse_scan_args(tokens: &[String]) -> Result<ScanArgs, CliError> {
    let mut args = ScanArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                args.input = PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?);
            }
            "--config" => {
                args.config = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
            }
            "--output" => {
                args.output = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
            }
            other => {
                return Err(CliError::invalid_input(format!("unknown scan option '{other}'")));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("scan requires --input <path>"));
    }
    Ok(args)
}

fn parse_counters_args(tokens: &[String]) -> Result<CountersArgs, CliError> {
    let mut source: Option<CounterSource> = None;
    let mut output: Option<PathBuf> = None;
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        let next = match flag {
            "--names" => Some(CounterSource::Names(PathBuf::from(take_flag_value(
                flag,
                inline_value,
                tokens,
                &mut idx,
            )?))),
            "--catalog" => {
                ensure_no_inline_value(flag, inline_value)?;
                Some(CounterSource::Catalog)
            }
            "--output" => {
                output = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
                None
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown counters option '{other}'"
                )));
            }
        };
        if let Some(next) = next {
            if source.is_some() {
                return Err(CliError::invalid_input(
                    "counters accepts exactly one of --names <path> or --catalog",
                ));
            }
            source = Some(next);
        }
        idx += 1;
    }

    let source = source.ok_or_else(|| {
        CliError::invalid_input("counters requires --names <path> or --catalog")
    })?;
    Ok(CountersArgs { source, output })
}

fn parse_config_args(tokens: &[String]) -> Result<ConfigArgs, CliError> {
    let mut args = ConfigArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--output" => {
                args.output = Some(PathBuf::from(take_flag_value(flag, inline_value, tokens, &mut idx)?));
            }
            other => {
                return Err(CliError::invalid_input(format!("unknown config option '{other}'")));
            }
        }
        idx += 1;
    }
    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<(), CliError> {
    if inline_value.is_some() {
        return Err(CliError::invalid_input(format!("{flag} does not accept a value")));
    }
    Ok(())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!("{flag} expects a non-negative integer, got '{raw}'"))
    })
}

fn print_version() {
    println!("gpubound {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "gpubound {}\n\nUSAGE:\n  gpubound [--log-level <filter>] [--log-format <compact|json>] <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  classify   Diagnose the bottleneck of one captured event\n  xray       Rank warp stalls of one captured event\n  scan       Classify every row of a capture and tally verdicts\n  counters   Export performance-counter settings JSON\n  config     Print the default classifier configuration\n\nRun 'gpubound <COMMAND> --help' for command options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "classify" => {
            println!(
                "USAGE:\n  gpubound classify --input <path> [OPTIONS]\n\nOPTIONS:\n  --input <path>    Required capture (.json or .csv)\n  --row <index>     Row to diagnose. Default: 0\n  --config <path>   Optional classifier config JSON (partial overrides allowed)\n  --output <path>   Write JSON output to file"
            );
            Ok(())
        }
        "xray" => {
            println!(
                "USAGE:\n  gpubound xray --input <path> [OPTIONS]\n\nOPTIONS:\n  --input <path>    Required capture (.json or .csv)\n  --row <index>     Row to inspect. Default: 0\n  --output <path>   Write JSON output to file"
            );
            Ok(())
        }
        "scan" => {
            println!(
                "USAGE:\n  gpubound scan --input <path> [OPTIONS]\n\nOPTIONS:\n  --input <path>    Required capture (.json or .csv)\n  --config <path>   Optional classifier config JSON\n  --output <path>   Write JSON output to file"
            );
            Ok(())
        }
        "counters" => {
            println!(
                "USAGE:\n  gpubound counters (--names <path> | --catalog) [--output <path>]\n\nOPTIONS:\n  --names <path>    Counter names, one per line\n  --catalog         Export the preferred spelling of every catalog metric\n  --output <path>   Write settings to file"
            );
            Ok(())
        }
        "config" => {
            println!("USAGE:\n  gpubound config [--output <path>]");
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: classify, xray, scan, counters, config"
        ))),
    }
}

fn build_classifier(config_path: Option<&Path>) -> Result<BoundClassifier, CliError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => ClassifierConfig::default(),
    };
    Ok(BoundClassifier::new(config)?)
}

fn handle_classify(args: ClassifyArgs) -> Result<(), CliError> {
    let capture = load_capture(args.input.as_path())?;
    let panel = BoundDetectorPanel::new(build_classifier(args.config.as_deref())?);

    let diagnosis = panel.diagnose(PanelRequest::new(&capture, Some(args.row)));
    let result = expect_report(diagnosis, args.input.as_path())?;

    let output = ClassifyOutput {
        input: InputSummary::new(args.input.as_path(), &capture),
        row: args.row,
        confidence_formula: confidence_formula(),
        result: &result,
    };
    write_json_output(&output, args.output.as_deref())
}

fn handle_xray(args: XrayArgs) -> Result<(), CliError> {
    let capture = load_capture(args.input.as_path())?;
    let panel = ShaderXrayPanel::default();

    let diagnosis = panel.diagnose(PanelRequest::new(&capture, Some(args.row)));
    let report = expect_report(diagnosis, args.input.as_path())?;

    let output = XrayOutput {
        input: InputSummary::new(args.input.as_path(), &capture),
        row: args.row,
        report: &report,
    };
    write_json_output(&output, args.output.as_deref())
}

/// Turns placeholder diagnoses into command errors.
fn expect_report<R>(diagnosis: Diagnosis<R>, input: &Path) -> Result<Box<R>, CliError> {
    match diagnosis {
        Diagnosis::Classified(report) => Ok(report),
        Diagnosis::EmptyCapture => Err(CliError::invalid_input(format!(
            "capture '{}' has no rows",
            input.display()
        ))),
        Diagnosis::SelectionOutOfRange { index, rows } => Err(CliError::invalid_input(format!(
            "--row {index} is out of range; capture has {rows} rows"
        ))),
        Diagnosis::NoSelection => Err(CliError::invalid_input("a row selection is required")),
    }
}

fn handle_scan(args: ScanArgs) -> Result<(), CliError> {
    let capture = load_capture(args.input.as_path())?;
    let classifier = build_classifier(args.config.as_deref())?;
    let context = CaptureContext::build(&capture, MetricCatalog::standard());

    let mut counts = BTreeMap::<HypothesisId, usize>::new();
    let rows = capture
        .rows()
        .iter()
        .enumerate()
        .map(|(row, counters)| {
            let result = classifier.classify(&context, counters);
            *counts.entry(result.hypothesis).or_default() += 1;
            ScanRowOutput {
                row,
                hypothesis: result.hypothesis,
                title: result.title,
                score: result.score,
                confidence: result.confidence,
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(rows = rows.len(), verdicts = counts.len(), "scanned capture");
    let output = ScanOutput {
        input: InputSummary::new(args.input.as_path(), &capture),
        coverage: context.schema.coverage(),
        rows,
        counts,
    };
    write_json_output(&output, args.output.as_deref())
}

fn handle_counters(args: CountersArgs) -> Result<(), CliError> {
    let names = match &args.source {
        CounterSource::Names(path) => load_counter_names(path.as_path())?,
        CounterSource::Catalog => catalog_names(MetricCatalog::standard()),
    };
    if names.is_empty() {
        return Err(CliError::invalid_input("no counter names to export"));
    }
    let rendered = render_settings(&names);

    match args.output.as_deref() {
        Some(path) => fs::write(path, rendered)
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source)),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

fn handle_config(args: ConfigArgs) -> Result<(), CliError> {
    write_json_output(&ClassifierConfig::default(), args.output.as_deref())
}

fn write_json_output<T: Serialize>(payload: &T, output_path: Option<&Path>) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}", fallback_error_json(err)),
    }
}

fn fallback_error_json(err: &CliError) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{
        CliError, Command, CounterSource, Diagnosis, LogFormat, expect_report, fallback_error_json,
        parse_cli,
    };
    use gpubound_doctor::StallReport;
    use std::path::Path;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|token| (*token).to_string()).collect()
    }

    #[test]
    fn global_logging_flags_are_accepted_anywhere() {
        let cli = parse_cli(args(&[
            "classify",
            "--input",
            "capture.json",
            "--log-format=json",
            "--row",
            "3",
            "--log-level",
            "debug",
        ]))
        .expect("arguments should parse")
        .expect("command should be present");

        assert_eq!(cli.logging.format, LogFormat::Json);
        assert_eq!(cli.logging.level, "debug");
        match cli.command {
            Command::Classify(classify) => {
                assert_eq!(classify.row, 3);
                assert_eq!(classify.input.to_str(), Some("capture.json"));
            }
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn classify_requires_input() {
        let err = parse_cli(args(&["classify", "--row", "1"])).err().expect("missing input must fail");
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn counters_requires_exactly_one_source() {
        let err = parse_cli(args(&["counters", "--catalog", "--names", "n.txt"]))
            .err()
            .expect("two sources must fail");
        assert!(err.to_string().contains("exactly one"));

        let cli = parse_cli(args(&["counters", "--catalog"]))
            .expect("arguments should parse")
            .expect("command should be present");
        match cli.command {
            Command::Counters(counters) => assert!(matches!(counters.source, CounterSource::Catalog)),
            _ => panic!("expected counters"),
        }
    }

    #[test]
    fn xray_parses_row_and_input() {
        let cli = parse_cli(args(&["xray", "--input=capture.csv", "--row", "2"]))
            .expect("arguments should parse")
            .expect("command should be present");
        match cli.command {
            Command::Xray(xray) => {
                assert_eq!(xray.row, 2);
                assert_eq!(xray.input.to_str(), Some("capture.csv"));
            }
            _ => panic!("expected xray"),
        }

        let err = parse_cli(args(&["xray", "--config", "c.json"])).err().expect("xray takes no config");
        assert!(err.to_string().contains("unknown xray option '--config'"));
    }

    #[test]
    fn placeholder_diagnoses_become_invalid_input() {
        let err = expect_report(
            Diagnosis::<StallReport>::SelectionOutOfRange { index: 4, rows: 2 },
            Path::new("capture.json"),
        )
        .expect_err("out of range selection must fail");
        assert_eq!(err.code(), "invalid_input");
        assert!(err.to_string().contains("--row 4 is out of range"));
    }

    #[test]
    fn fallback_error_json_escapes_message() {
        let err = CliError::invalid_input("bad \"quote\"\nand \\ backslash");
        let rendered = fallback_error_json(&err).to_string();
        let parsed: serde_json::Value =
            serde_json::from_str(rendered.as_str()).expect("fallback envelope should be valid JSON");
        assert_eq!(parsed["error"]["code"], "invalid_input");
        assert_eq!(parsed["error"]["message"], "bad \"quote\"\nand \\ backslash");
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse_cli(args(&["detect"])).err().expect("unknown command must fail");
        assert!(err.to_string().contains("unknown command 'detect'"));
    }
}
