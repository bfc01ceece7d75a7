//! Batch toolkit for Package URLs: validate PURLs locally, query a PurlDB
//! service for each one with bounded concurrency and retries, and report
//! the per-item outcomes as JSON, CSV or a table.

pub mod batch;
pub mod cli;
pub mod commands;
pub mod common;
pub mod error;
pub mod remote;
pub mod report;
pub mod source;
pub mod validation;
