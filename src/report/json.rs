use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::RunHeader;
use crate::common::{BatchEntry, BatchResult, PurlOutcome};

/// Error block of a failed report line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// One report record: `{purl, status, data}` or `{purl, status, error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub purl: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl ReportLine {
    pub fn from_entry(entry: &BatchEntry) -> Self {
        let outcome = &entry.outcome;
        let (data, error) = match outcome {
            PurlOutcome::Success { payload } => (Some(payload.to_value()), None),
            _ => {
                let status_code = match outcome {
                    PurlOutcome::RemoteError { error } => error.status_code(),
                    _ => None,
                };
                let error = ReportError {
                    kind: outcome.error_kind().unwrap_or_default().to_string(),
                    message: outcome.error_message().unwrap_or_default(),
                    status_code,
                };
                (None, Some(error))
            }
        };

        Self {
            purl: entry.request.raw.clone(),
            status: outcome.status().to_string(),
            data,
            error,
        }
    }
}

pub(super) fn render_json_lines(result: &BatchResult) -> String {
    let mut out = String::new();
    for entry in &result.entries {
        let line = serde_json::to_string(&ReportLine::from_entry(entry))
            .unwrap_or_else(|e| json!({"purl": entry.request.raw, "status": "error", "error": e.to_string()}).to_string());
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub(super) fn render_document(result: &BatchResult, header: Option<&RunHeader>) -> String {
    let mut header_value = match header {
        Some(header) => serde_json::to_value(header).unwrap_or_else(|_| json!({})),
        None => json!({
            "tool_name": super::TOOL_NAME,
            "tool_version": env!("CARGO_PKG_VERSION"),
        }),
    };
    if let Value::Object(map) = &mut header_value {
        let mut summary = serde_json::to_value(&result.summary).unwrap_or_else(|_| json!({}));
        if let Value::Object(fields) = &mut summary {
            fields.insert("success_ratio".to_string(), json!(result.summary.success_ratio()));
        }
        map.insert("summary".to_string(), summary);
        map.insert("warnings".to_string(), json!(result.warnings));
        map.entry("errors").or_insert_with(|| json!([]));
    }

    let packages: Vec<ReportLine> = result.entries.iter().map(ReportLine::from_entry).collect();
    let document = json!({
        "headers": [header_value],
        "packages": packages,
    });

    let mut out = serde_json::to_string_pretty(&document).unwrap_or_default();
    out.push('\n');
    out
}

/// Parse JSON-lines report text back into records
pub fn parse_json_lines(text: &str) -> serde_json::Result<Vec<ReportLine>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}
