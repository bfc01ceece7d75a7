use clap::{Args, Parser, Subcommand};

use crate::common::{API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL};

#[derive(Parser)]
#[command(name = "purlcli")]
#[command(about = "Validate Package URLs and query PurlDB for metadata, URLs, validity and versions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch package metadata for each PURL
    Metadata(QueryArgs),

    /// Fetch repository, download and homepage URLs for each PURL
    Urls(UrlsArgs),

    /// Ask the service whether each PURL is valid and known
    Validate(QueryArgs),

    /// List known versions for each PURL
    Versions(QueryArgs),
}

/// Options shared by every capability command
#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    /// PURL to process (repeatable)
    #[arg(short, long = "purl", conflicts_with = "file")]
    pub purls: Vec<String>,

    /// Newline-delimited file of PURLs (reads stdin when neither --purl nor --file is given)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report format (json, json-pretty, csv, table)
    #[arg(long, default_value = "json")]
    pub format: String,

    /// PurlDB API base URL
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// API token sent as `Authorization: Token <key>`
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Timeout in seconds per request
    #[arg(short, long, default_value = "30")]
    pub timeout: u64,

    /// Retries after a transport error, timeout or 5xx response
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Concurrent requests (0 = auto)
    #[arg(short, long, default_value = "0")]
    pub concurrency: usize,

    /// Reject PURL types outside the registered type list
    #[arg(long, default_value = "false")]
    pub strict: bool,

    /// Skip the startup reachability check
    #[arg(long, default_value = "false")]
    pub skip_probe: bool,

    /// Stop dispatching new requests after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Fraction of calls allowed to end unavailable before the run is degraded (0.0 to 1.0)
    #[arg(long, value_parser = parse_error_budget)]
    pub error_budget: Option<f64>,

    /// Stop dispatching once the error budget is exceeded
    #[arg(long, default_value = "false", requires = "error_budget")]
    pub abort_on_budget: bool,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Args, Clone, Debug)]
pub struct UrlsArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Check each returned URL with a HEAD request and record its status
    #[arg(long, default_value = "false")]
    pub head: bool,
}

/// Accept only a finite fraction within 0.0..=1.0
fn parse_error_budget(value: &str) -> Result<f64, String> {
    let budget: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (0.0..=1.0).contains(&budget) {
        Ok(budget)
    } else {
        Err(format!("{} is outside 0.0..=1.0", value))
    }
}
