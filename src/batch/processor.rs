use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{BatchOptions, ItemState};
use crate::common::{
    create_count_progress_bar, format_elapsed, BatchEntry, BatchResult, BatchSummary, Capability,
    PurlOutcome, PurlRequest,
};
use crate::error::{RemoteError, ValidationError};
use crate::remote::PurlService;
use crate::validation::{ParsedPurl, PurlValidator};

/// A validated request waiting in the dispatch queue
struct Job {
    index: usize,
    purl: ParsedPurl,
}

/// Runs one capability over a batch of PURLs.
///
/// Validation happens eagerly and in parallel. Validated items go into a
/// dispatch queue drained by a fixed pool of workers; each worker reports
/// `(index, outcome)` on a result channel and the collector writes slot
/// `index` exactly once, so input order survives any completion order.
pub struct BatchProcessor {
    service: Arc<dyn PurlService>,
    validator: PurlValidator,
    options: BatchOptions,
    cancel: CancellationToken,
}

impl BatchProcessor {
    pub fn new(service: Arc<dyn PurlService>, validator: PurlValidator, options: BatchOptions) -> Self {
        Self {
            service,
            validator,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a run-level cancellation token (Ctrl-C, deadline)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, capability: Capability, requests: Vec<PurlRequest>) -> BatchResult {
        let start = Instant::now();
        let total = requests.len();
        let mut warnings = duplicate_warnings(&requests);

        let (requests, validated) = self.validate_off_runtime(requests).await;

        let mut slots: Vec<Option<PurlOutcome>> = vec![None; total];
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();

        for (index, result) in validated.into_iter().enumerate() {
            match result {
                Ok(purl) => {
                    if let Err(e) = job_tx.send(Job { index, purl }) {
                        error!("Failed to queue PURL at position {}: {}", index, e);
                    }
                }
                Err(reason) => {
                    debug!(
                        "[{}] {} -> {:?}: {}",
                        index,
                        requests[index].raw,
                        ItemState::ValidationFailed,
                        reason
                    );
                    slots[index] = Some(PurlOutcome::ValidationError { reason });
                }
            }
        }
        drop(job_tx);

        let queued = job_rx.len();
        info!(
            "Validated {} PURLs: {} queued for {}, {} invalid",
            total,
            queued,
            capability,
            total - queued
        );

        let progress = create_count_progress_bar(queued as u64, self.options.show_progress);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, PurlOutcome)>();

        let worker_count = self.options.concurrency.max(1).min(queued.max(1));
        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = job_rx.clone();
            let results = result_tx.clone();
            let service = Arc::clone(&self.service);
            let cancel = self.cancel.clone();
            workers.spawn(run_worker(worker_id, capability, service, queue, results, cancel));
        }
        drop(result_tx);
        drop(job_rx);

        let mut queried = 0;
        let mut unavailable = 0;
        while let Some((index, outcome)) = result_rx.recv().await {
            queried += 1;
            if matches!(
                outcome,
                PurlOutcome::RemoteError {
                    error: RemoteError::Unavailable { .. }
                }
            ) {
                unavailable += 1;
            }
            progress.inc(1);

            if self.options.abort_on_budget
                && !self.cancel.is_cancelled()
                && self.options.budget_exceeded(unavailable, queried)
            {
                warn!(
                    "Error budget exceeded ({} of {} calls unavailable), stopping dispatch",
                    unavailable, queried
                );
                self.cancel.cancel();
            }

            debug!("[{}] {} -> {:?}", index, requests[index].raw, outcome.state());
            debug_assert!(slots[index].is_none(), "slot {} written twice", index);
            slots[index] = Some(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }
        progress.finish_with_message("Batch complete");

        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };
        let mut entries = Vec::with_capacity(total);
        for (request, slot) in requests.into_iter().zip(slots) {
            match slot {
                Some(outcome) => {
                    summary.record(&outcome);
                    entries.push(BatchEntry { request, outcome });
                }
                None => summary.not_dispatched += 1,
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        let remote_processed = summary.succeeded + summary.failed_remote + summary.timed_out;
        summary.degraded = self.options.budget_exceeded(summary.unavailable, remote_processed);

        if summary.cancelled {
            warnings.push(format!(
                "run cancelled: {} of {} PURLs were not dispatched",
                summary.not_dispatched, total
            ));
        }
        if summary.degraded {
            warnings.push(format!(
                "error budget exceeded: {} of {} remote calls unavailable",
                summary.unavailable, remote_processed
            ));
        }

        info!(
            "Batch finished in {}: {} succeeded, {} invalid, {} remote failures, {} timed out",
            format_elapsed(start.elapsed()),
            summary.succeeded,
            summary.failed_validation,
            summary.failed_remote,
            summary.timed_out
        );

        BatchResult {
            entries,
            summary,
            warnings,
        }
    }
}

impl BatchProcessor {
    /// Run the rayon validation pass on the blocking pool
    async fn validate_off_runtime(
        &self,
        requests: Vec<PurlRequest>,
    ) -> (Vec<PurlRequest>, Vec<Result<ParsedPurl, ValidationError>>) {
        let validator = self.validator;
        let task = tokio::task::spawn_blocking(move || {
            let validated = validator.validate_all(&requests);
            (requests, validated)
        });
        match task.await {
            Ok(done) => done,
            Err(e) => {
                error!("Validation task failed: {}", e);
                std::panic::resume_unwind(e.into_panic())
            }
        }
    }
}

/// Drain the dispatch queue until it is empty or the run is cancelled
async fn run_worker(
    worker_id: usize,
    capability: Capability,
    service: Arc<dyn PurlService>,
    queue: Receiver<Job>,
    results: UnboundedSender<(usize, PurlOutcome)>,
    cancel: CancellationToken,
) {
    let mut handled = 0;
    loop {
        if cancel.is_cancelled() {
            debug!("Worker {} stopping: run cancelled", worker_id);
            break;
        }
        let job = match queue.try_recv() {
            Ok(job) => job,
            Err(_) => break,
        };

        let outcome = query(service.as_ref(), capability, &job.purl).await;
        handled += 1;

        if results.send((job.index, outcome)).is_err() {
            break;
        }
    }
    debug!("Worker {} handled {} PURLs", worker_id, handled);
}

async fn query(service: &dyn PurlService, capability: Capability, purl: &ParsedPurl) -> PurlOutcome {
    match service.fetch(capability, purl).await {
        Ok(payload) => PurlOutcome::Success { payload },
        Err(RemoteError::Timeout { .. }) => PurlOutcome::Timeout,
        Err(error) => PurlOutcome::RemoteError { error },
    }
}

/// Repeated input strings are processed normally but flagged
fn duplicate_warnings(requests: &[PurlRequest]) -> Vec<String> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut warnings = Vec::new();
    for request in requests {
        match first_seen.get(request.raw.as_str()) {
            Some(first) => warnings.push(format!(
                "duplicate purl {} at position {} (first seen at {})",
                request.raw, request.position, first
            )),
            None => {
                first_seen.insert(&request.raw, request.position);
            }
        }
    }
    warnings
}
