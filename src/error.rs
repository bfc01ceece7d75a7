//! Error types shared across the toolkit.
//!
//! Per-item failures (`ValidationError`, `RemoteError`) are captured into a
//! [`PurlOutcome`](crate::common::PurlOutcome) and never abort a batch. Only
//! [`ToolkitError`] is fatal, and it is raised before any processing starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal setup errors. Any of these stops the run without a report.
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// The input produced no PURLs after skipping blank and comment lines
    #[error("no PURLs to process: input is empty")]
    EmptyInput,

    /// The requested report format is not recognized
    #[error("unsupported output format: {0} (expected json, json-pretty, csv or table)")]
    UnsupportedFormat(String),

    /// The configured base URL cannot be parsed
    #[error("invalid base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// The startup probe could not reach the service
    #[error("service unreachable at {url}: {message}")]
    ServiceUnreachable { url: String, message: String },

    /// Reading the input failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a raw string was rejected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("malformed purl: {0}")]
    MalformedPurl(String),

    #[error("purl type is empty")]
    EmptyType,

    #[error("unknown purl type: {0}")]
    UnknownType(String),
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MalformedPurl(_) => "malformed_purl",
            ValidationError::EmptyType => "empty_type",
            ValidationError::UnknownType(_) => "unknown_type",
        }
    }
}

/// Coarse classification of a [`RemoteError`], used for counters and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    Unavailable,
    MalformedResponse,
    ClientRejected,
    Timeout,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::Unavailable => "unavailable",
            RemoteErrorKind::MalformedResponse => "malformed_response",
            RemoteErrorKind::ClientRejected => "client_rejected",
            RemoteErrorKind::Timeout => "timeout",
        }
    }
}

/// Failure of one remote capability call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport failures or 5xx responses outlasted the retry budget
    #[error("service unavailable after {attempts} attempt(s): {message}")]
    Unavailable {
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    /// The body was not usable JSON
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A 4xx response; never retried
    #[error("request rejected with HTTP {status}: {message}")]
    ClientRejected { status: u16, message: String },

    /// The final attempt hit the per-request timeout
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::Unavailable { .. } => RemoteErrorKind::Unavailable,
            RemoteError::MalformedResponse(_) => RemoteErrorKind::MalformedResponse,
            RemoteError::ClientRejected { .. } => RemoteErrorKind::ClientRejected,
            RemoteError::Timeout { .. } => RemoteErrorKind::Timeout,
        }
    }

    /// HTTP status associated with the failure, when one was received
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Unavailable { status, .. } => *status,
            RemoteError::ClientRejected { status, .. } => Some(*status),
            RemoteError::MalformedResponse(_) | RemoteError::Timeout { .. } => None,
        }
    }
}

/// Typed access into a remote JSON payload failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("field missing: {0}")]
    FieldMissing(String),

    #[error("field {field} is not a {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}
