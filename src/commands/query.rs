use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchOptions, BatchProcessor};
use crate::cli::QueryArgs;
use crate::common::{format_elapsed, setup_logging, write_report, BatchSummary, Capability, ClientConfig};
use crate::remote::RemoteClient;
use crate::report::{OutputFormat, ReportEmitter, RunHeader};
use crate::source::PurlSource;
use crate::validation::PurlValidator;

/// Run one capability over the PURLs named by `args` and write the report.
/// `head` only applies to [`Capability::Urls`].
pub async fn run_capability_async(
    capability: Capability,
    args: QueryArgs,
    head: bool,
) -> Result<BatchSummary> {
    let start_time = Instant::now();

    let format: OutputFormat = args.format.parse()?;
    let config = ClientConfig::new(&args.base_url, format)?
        .with_timeout(args.timeout)
        .with_max_retries(args.max_retries)
        .with_api_key(args.api_key.clone());
    let options = BatchOptions {
        error_budget: args.error_budget,
        abort_on_budget: args.abort_on_budget,
        show_progress: true,
        ..Default::default()
    }
    .with_concurrency(args.concurrency);

    info!("Starting purlcli {}", capability);
    info!("Base URL: {}", config.base_url);
    info!("Format: {}", format);
    info!("Output: {}", args.output.as_deref().unwrap_or("stdout"));
    info!("Concurrency: {}", options.concurrency);
    info!("Timeout: {}s, max retries: {}", config.timeout_seconds, config.max_retries);
    if let Some(budget) = options.error_budget {
        info!("Error budget: {:.1}%", budget * 100.0);
    }

    let source = PurlSource::from_options(&args.purls, args.file.as_deref());
    // stdin and file reads block
    let requests = tokio::task::spawn_blocking(move || source.read())
        .await
        .context("PURL reader task failed")??;
    info!("Read {} PURLs", requests.len());

    let cancel = CancellationToken::new();
    let client = RemoteClient::new(config.clone())?
        .with_cancellation(cancel.clone())
        .with_head_check(head && capability == Capability::Urls);

    if args.skip_probe {
        info!("Skipping reachability check");
    } else {
        client.probe().await?;
        info!("Service reachable at {}", config.base_url);
    }

    spawn_interrupt_watcher(cancel.clone());
    if let Some(secs) = args.deadline {
        spawn_deadline(cancel.clone(), Duration::from_secs(secs));
    }

    let mut header = RunHeader::new(capability)
        .with_option("--base-url", config.base_url.as_str())
        .with_option("--format", format.to_string())
        .with_option("--concurrency", options.concurrency)
        .with_option("--timeout", config.timeout_seconds)
        .with_option("--max-retries", config.max_retries)
        .with_option("--strict", args.strict);
    if let Some(file) = &args.file {
        header = header.with_option("--file", file.as_str());
    }
    if let Some(deadline) = args.deadline {
        header = header.with_option("--deadline", deadline);
    }
    if let Some(budget) = args.error_budget {
        header = header.with_option("--error-budget", budget);
    }
    if capability == Capability::Urls {
        header = header.with_option("--head", head);
    }

    let processor = BatchProcessor::new(Arc::new(client), PurlValidator::new(args.strict), options)
        .with_cancellation(cancel.clone());
    let result = processor.run(capability, requests).await;

    for warning in &result.warnings {
        warn!("{}", warning);
    }

    header.finish();
    let report = ReportEmitter::new(format).with_header(header).emit(&result)?;
    write_report(&report, args.output.as_deref())
        .with_context(|| format!("Failed to write {} report", format))?;

    let summary = result.summary;
    let total_time = start_time.elapsed();

    info!("==================== FINAL SUMMARY ====================");
    info!("Total execution time: {}", format_elapsed(total_time));
    info!("Command: {}", capability);
    info!("PURLs read: {}", summary.total);
    info!(
        "Succeeded: {} ({:.2}%)",
        summary.succeeded,
        100.0 * summary.success_ratio()
    );
    info!("Failed validation: {}", summary.failed_validation);
    info!("Remote failures: {} ({} unavailable)", summary.failed_remote, summary.unavailable);
    info!("Timed out: {}", summary.timed_out);
    if summary.cancelled {
        info!("Not dispatched (cancelled): {}", summary.not_dispatched);
    }
    if summary.degraded {
        warn!("Run degraded: error budget exceeded");
    }
    info!("Output: {}", args.output.as_deref().unwrap_or("stdout"));
    info!("========================================================");

    Ok(summary)
}

pub fn run_capability(capability: Capability, args: QueryArgs, head: bool) -> Result<BatchSummary> {
    setup_logging(&args.log_level)?;
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    rt.block_on(run_capability_async(capability, args, head))
}

/// Cancel the run on the first Ctrl-C
fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    warn!("Interrupted, finishing in-flight requests");
                    cancel.cancel();
                }
            }
            _ = cancel.cancelled() => {}
        }
    });
}

/// Cancel the run once `deadline` has elapsed
fn spawn_deadline(cancel: CancellationToken, deadline: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                warn!("Deadline of {}s reached, no new requests will be dispatched", deadline.as_secs());
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}
