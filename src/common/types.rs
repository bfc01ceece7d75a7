use serde::{Deserialize, Serialize};
use std::fmt;

use super::Payload;
use crate::error::{RemoteError, ValidationError};

/// One raw input line and its position in the input sequence.
/// The position is the only ordering key for results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurlRequest {
    pub raw: String,
    pub position: usize,
}

impl PurlRequest {
    pub fn new(raw: impl Into<String>, position: usize) -> Self {
        Self {
            raw: raw.into(),
            position,
        }
    }
}

/// Remote capability selected by the subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Metadata,
    Urls,
    Validate,
    Versions,
}

impl Capability {
    /// Path segment appended to the service base URL
    pub fn path(&self) -> &'static str {
        match self {
            Capability::Metadata => "metadata/",
            Capability::Urls => "urls/",
            Capability::Validate => "validate/",
            Capability::Versions => "versions/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Metadata => "metadata",
            Capability::Urls => "urls",
            Capability::Validate => "validate",
            Capability::Versions => "versions",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of processing one PURL. Exactly one per processed request.
#[derive(Debug, Clone, PartialEq)]
pub enum PurlOutcome {
    Success { payload: Payload },
    ValidationError { reason: ValidationError },
    RemoteError { error: RemoteError },
    Timeout,
}

impl PurlOutcome {
    /// Status token used in every report format
    pub fn status(&self) -> &'static str {
        match self {
            PurlOutcome::Success { .. } => "succeeded",
            PurlOutcome::ValidationError { .. } => "validation_failed",
            PurlOutcome::RemoteError { .. } => "remote_failed",
            PurlOutcome::Timeout => "timed_out",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PurlOutcome::Success { .. })
    }

    /// Kind token for failures, `None` on success
    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            PurlOutcome::Success { .. } => None,
            PurlOutcome::ValidationError { reason } => Some(reason.kind()),
            PurlOutcome::RemoteError { error } => Some(error.kind().as_str()),
            PurlOutcome::Timeout => Some("timeout"),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            PurlOutcome::Success { .. } => None,
            PurlOutcome::ValidationError { reason } => Some(reason.to_string()),
            PurlOutcome::RemoteError { error } => Some(error.to_string()),
            PurlOutcome::Timeout => Some("request timed out".to_string()),
        }
    }
}

/// A request paired with its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub request: PurlRequest,
    pub outcome: PurlOutcome,
}

/// Counters reported alongside the batch entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed_validation: usize,
    pub failed_remote: usize,
    pub timed_out: usize,
    /// Subset of `failed_remote` that exhausted the retry budget
    pub unavailable: usize,
    /// Requests never handed to a worker because the run was cancelled
    pub not_dispatched: usize,
    pub cancelled: bool,
    /// Unavailable outcomes exceeded the configured error budget
    pub degraded: bool,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &PurlOutcome) {
        match outcome {
            PurlOutcome::Success { .. } => self.succeeded += 1,
            PurlOutcome::ValidationError { .. } => self.failed_validation += 1,
            PurlOutcome::RemoteError { error } => {
                self.failed_remote += 1;
                if matches!(error, RemoteError::Unavailable { .. }) {
                    self.unavailable += 1;
                }
            }
            PurlOutcome::Timeout => self.timed_out += 1,
        }
    }

    /// Items that reached a terminal state
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed_validation + self.failed_remote + self.timed_out
    }

    /// Share of processed items that succeeded, 0.0 for an empty run
    pub fn success_ratio(&self) -> f64 {
        match self.processed() {
            0 => 0.0,
            n => self.succeeded as f64 / n as f64,
        }
    }
}

/// Ordered outcomes of one run. Entries are in input order; after a
/// cancellation, requests that were never dispatched have no entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
    pub warnings: Vec<String>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
