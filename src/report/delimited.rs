use csv::Writer;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::common::BatchResult;
use crate::error::ToolkitError;

const FIXED_COLUMNS: [&str; 3] = ["purl", "status", "error"];

/// CSV with `purl,status,error` followed by one `data.<path>` column per
/// flattened payload field seen anywhere in the batch, sorted by path.
pub(super) fn render_csv(result: &BatchResult) -> Result<String, ToolkitError> {
    let rows: Vec<BTreeMap<String, String>> = result
        .entries
        .iter()
        .map(|entry| {
            let mut row = BTreeMap::new();
            if let crate::common::PurlOutcome::Success { payload } = &entry.outcome {
                for (path, value) in payload.flatten() {
                    row.insert(format!("data.{}", path), cell(&value));
                }
            }
            row
        })
        .collect();

    let data_columns: BTreeSet<&String> = rows.iter().flat_map(|row| row.keys()).collect();

    let mut writer = Writer::from_writer(Vec::new());
    let header = FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(data_columns.iter().map(|c| c.to_string()));
    writer.write_record(header).map_err(csv_error)?;

    for (entry, row) in result.entries.iter().zip(&rows) {
        let fixed = [
            entry.request.raw.clone(),
            entry.outcome.status().to_string(),
            entry.outcome.error_message().unwrap_or_default(),
        ];
        let data = data_columns
            .iter()
            .map(|column| row.get(*column).cloned().unwrap_or_default());
        writer
            .write_record(fixed.into_iter().chain(data))
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ToolkitError::Io(std::io::Error::other(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| ToolkitError::Io(std::io::Error::other(e)))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_error(e: csv::Error) -> ToolkitError {
    ToolkitError::Io(std::io::Error::other(e))
}
