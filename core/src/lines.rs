use serde::Serialize;

use crate::ansi::scrub_csi;

pub const ERROR_PREFIX: &str = "[ERROR]";
pub const PARSE_ERROR_PREFIX: &str = "[DATA PARSE ERROR]";
pub const INFO_PREFIX: &str = "[INFO]";

/// Rendering class of a single output line. Derived purely from the line
/// text (see [`classify`]) so that any renderer styles the same line the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineKind {
    Stdout,
    Error,
    Success,
    Warning,
    Info,
    Notice,
    Plain,
}

/// One appended line of viewer output. Append-only; never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub text: String,
    pub kind: LineKind,
}

impl OutputLine {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = classify(&text);
        Self { text, kind }
    }
}

/// Deterministic content-derived classification: marker prefixes decide the
/// class, unmarked non-empty text is command stdout, whitespace-only lines
/// are plain filler.
pub fn classify(text: &str) -> LineKind {
    if text.starts_with(PARSE_ERROR_PREFIX) {
        LineKind::Warning
    } else if text.starts_with(ERROR_PREFIX) || text.starts_with('✖') {
        LineKind::Error
    } else if text.starts_with(INFO_PREFIX) {
        LineKind::Info
    } else if text.starts_with('✔') {
        LineKind::Success
    } else if text.starts_with('▶') || text.starts_with('●') || text.starts_with('■') {
        LineKind::Notice
    } else if text.trim().is_empty() {
        LineKind::Plain
    } else {
        LineKind::Stdout
    }
}

/// Extract the emitted text from a `stdout`/`stderr` event payload. The
/// backend emits either a JSON string or an object carrying the text under
/// `text` or `data`.
pub fn parse_output_payload(data: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::String(text)) => Some(text),
        Ok(serde_json::Value::Object(map)) => map
            .get("text")
            .or_else(|| map.get("data"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

pub fn starting_notice(command_id: &str) -> OutputLine {
    OutputLine::new(format!("▶ Starting command: {command_id}"))
}

pub fn connected_notice() -> OutputLine {
    OutputLine::new("● Connected to command stream")
}

pub fn stopped_notice() -> OutputLine {
    OutputLine::new("■ Stopped by user")
}

pub fn completed_notice(exit_code: i32) -> OutputLine {
    OutputLine::new(format!("✔ Command completed (exit code: {exit_code})"))
}

pub fn failed_notice(error: Option<&str>) -> OutputLine {
    let reason = scrub_csi(error.unwrap_or("Unknown error"));
    OutputLine::new(format!("✖ Command failed: {reason}"))
}

pub fn result_parse_failure_notice() -> OutputLine {
    OutputLine::new("✖ Command finished with an unreadable result payload")
}

pub fn connection_error_notice(reason: &str) -> OutputLine {
    OutputLine::new(format!("✖ Connection error: {reason}"))
}

/// Render a `stdout` event payload as an output line.
pub fn stdout_line(data: &str) -> OutputLine {
    match parse_output_payload(data) {
        Some(text) => OutputLine::new(scrub_csi(&text)),
        None => OutputLine::new(format!("{PARSE_ERROR_PREFIX} {data}")),
    }
}

/// Render a `stderr` event payload as an output line.
pub fn stderr_line(data: &str) -> OutputLine {
    match parse_output_payload(data) {
        Some(text) => OutputLine::new(format!("{ERROR_PREFIX} {}", scrub_csi(&text))),
        None => OutputLine::new(format!("{PARSE_ERROR_PREFIX} {data}")),
    }
}
