//! Rendering of a [`BatchResult`] into JSON lines, a JSON document, CSV or a
//! fixed-width table. Rendering only produces text; the caller decides where
//! it goes.

mod delimited;
mod json;
mod table;

pub use json::{parse_json_lines, ReportError, ReportLine};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::common::{BatchResult, Capability};
use crate::error::ToolkitError;

pub const TOOL_NAME: &str = "purlcli";

/// Report encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON object per PURL
    JsonLines,
    /// A single document with run headers and a `packages` array
    JsonPretty,
    Csv,
    Table,
}

impl FromStr for OutputFormat {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "jsonl" | "json-lines" => Ok(OutputFormat::JsonLines),
            "json-pretty" => Ok(OutputFormat::JsonPretty),
            "csv" => Ok(OutputFormat::Csv),
            "table" => Ok(OutputFormat::Table),
            _ => Err(ToolkitError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            OutputFormat::JsonLines => "json",
            OutputFormat::JsonPretty => "json-pretty",
            OutputFormat::Csv => "csv",
            OutputFormat::Table => "table",
        };
        f.write_str(token)
    }
}

/// Run metadata placed in the `headers` block of the JSON document format
#[derive(Debug, Clone, Serialize)]
pub struct RunHeader {
    pub tool_name: String,
    pub tool_version: String,
    pub command: String,
    pub run_id: String,
    pub start_timestamp: String,
    pub end_timestamp: String,
    pub duration_seconds: f64,
    pub options: BTreeMap<String, Value>,
    pub errors: Vec<String>,
    #[serde(skip)]
    started: Instant,
}

impl RunHeader {
    pub fn new(command: Capability) -> Self {
        Self {
            tool_name: TOOL_NAME.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            command: command.to_string(),
            run_id: Uuid::new_v4().to_string(),
            start_timestamp: now_rfc3339(),
            end_timestamp: String::new(),
            duration_seconds: 0.0,
            options: BTreeMap::new(),
            errors: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn with_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.options.insert(name.to_string(), value.into());
        self
    }

    /// Stamp the end time and duration
    pub fn finish(&mut self) {
        self.end_timestamp = now_rfc3339();
        self.duration_seconds = self.started.elapsed().as_secs_f64();
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Renders batch results in one format
#[derive(Debug, Clone)]
pub struct ReportEmitter {
    format: OutputFormat,
    header: Option<RunHeader>,
}

impl ReportEmitter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            header: None,
        }
    }

    pub fn with_header(mut self, header: RunHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn emit(&self, result: &BatchResult) -> Result<String, ToolkitError> {
        let rendered = match self.format {
            OutputFormat::JsonLines => json::render_json_lines(result),
            OutputFormat::JsonPretty => json::render_document(result, self.header.as_ref()),
            OutputFormat::Csv => delimited::render_csv(result)?,
            OutputFormat::Table => table::render_table(result),
        };
        Ok(rendered)
    }
}

/// Render `result` in the format named by `format`.
/// Fails with `UnsupportedFormat` for unknown tokens.
pub fn emit(result: &BatchResult, format: &str) -> Result<String, ToolkitError> {
    let format = OutputFormat::from_str(format)?;
    ReportEmitter::new(format).emit(result)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tokens() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::JsonLines);
        assert_eq!("JSONL".parse::<OutputFormat>().unwrap(), OutputFormat::JsonLines);
        assert_eq!("json-pretty".parse::<OutputFormat>().unwrap(), OutputFormat::JsonPretty);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(" Table ".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
    }

    #[test]
    fn test_unsupported_format() {
        let result = fixtures::sample_result();
        match emit(&result, "yaml") {
            Err(ToolkitError::UnsupportedFormat(token)) => assert_eq!(token, "yaml"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_emit_dispatches_by_token() {
        let result = fixtures::sample_result();
        assert_eq!(emit(&result, "json").unwrap().lines().count(), 3);
        assert!(emit(&result, "csv").unwrap().starts_with("purl,status,error"));
        assert!(emit(&result, "table").unwrap().starts_with("PURL"));
    }

    #[test]
    fn test_header_finish_sets_end() {
        let mut header = RunHeader::new(Capability::Urls).with_option("--head", true);
        header.finish();
        assert_eq!(header.command, "urls");
        assert!(!header.end_timestamp.is_empty());
        assert_eq!(header.options["--head"], Value::Bool(true));
        assert_eq!(header.run_id.len(), 36);
    }
}
