use crate::common::{truncate, BatchResult, PurlOutcome};

const MAX_PURL_WIDTH: usize = 60;
const STATUS_WIDTH: usize = 17;
const DETAIL_WIDTH: usize = 80;

/// Fixed-width `PURL  STATUS  DETAIL` table with a summary footer
pub(super) fn render_table(result: &BatchResult) -> String {
    let purl_width = result
        .entries
        .iter()
        .map(|e| e.request.raw.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(4, MAX_PURL_WIDTH);

    let mut out = String::new();
    push_row(&mut out, "PURL", "STATUS", "DETAIL", purl_width);
    push_row(
        &mut out,
        &"-".repeat(purl_width),
        &"-".repeat(STATUS_WIDTH),
        &"-".repeat(DETAIL_WIDTH),
        purl_width,
    );

    for entry in &result.entries {
        let detail = match &entry.outcome {
            PurlOutcome::Success { payload } => payload.to_value().to_string(),
            other => other.error_message().unwrap_or_default(),
        };
        push_row(
            &mut out,
            &truncate(&entry.request.raw, purl_width),
            entry.outcome.status(),
            &truncate(&detail, DETAIL_WIDTH),
            purl_width,
        );
    }

    let s = &result.summary;
    out.push_str(&format!(
        "\n{} total, {} succeeded, {} invalid, {} remote failures, {} timed out",
        s.total, s.succeeded, s.failed_validation, s.failed_remote, s.timed_out
    ));
    if s.not_dispatched > 0 {
        out.push_str(&format!(", {} not dispatched", s.not_dispatched));
    }
    out.push('\n');
    out
}

fn push_row(out: &mut String, purl: &str, status: &str, detail: &str, purl_width: usize) {
    let line = format!(
        "{:<purl_width$}  {:<status_width$}  {}",
        purl,
        status,
        detail,
        purl_width = purl_width,
        status_width = STATUS_WIDTH
    );
    out.push_str(line.trim_end());
    out.push('\n');
}
