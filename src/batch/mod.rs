//! Batch orchestration: validation, bounded concurrent querying, and
//! order-preserving aggregation of per-item outcomes.

pub mod processor;

pub use processor::*;

use crate::common::PurlOutcome;

/// Lifecycle of one request.
///
/// `Pending -> Validating -> (ValidationFailed | Validated)`, then for
/// validated items `Querying -> (Succeeded | RemoteFailed | TimedOut)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Validating,
    ValidationFailed,
    Validated,
    Querying,
    Succeeded,
    RemoteFailed,
    TimedOut,
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemState::ValidationFailed
                | ItemState::Succeeded
                | ItemState::RemoteFailed
                | ItemState::TimedOut
        )
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, ValidationFailed)
                | (Validating, Validated)
                | (Validated, Querying)
                | (Querying, Succeeded)
                | (Querying, RemoteFailed)
                | (Querying, TimedOut)
        )
    }
}

impl PurlOutcome {
    /// Terminal state reached by an item with this outcome
    pub fn state(&self) -> ItemState {
        match self {
            PurlOutcome::Success { .. } => ItemState::Succeeded,
            PurlOutcome::ValidationError { .. } => ItemState::ValidationFailed,
            PurlOutcome::RemoteError { .. } => ItemState::RemoteFailed,
            PurlOutcome::Timeout => ItemState::TimedOut,
        }
    }
}

/// Default worker count when none is requested: CPU count within 4..=8
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(4, 8)
}

/// Knobs for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    /// Fraction of remote calls allowed to end `Unavailable` before the run
    /// is reported as degraded. `None` disables the check.
    pub error_budget: Option<f64>,
    /// Stop dispatching once the error budget is exceeded
    pub abort_on_budget: bool,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            error_budget: None,
            abort_on_budget: false,
            show_progress: false,
        }
    }
}

impl BatchOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 {
            default_concurrency()
        } else {
            concurrency
        };
        self
    }

    /// Whether `unavailable` out of `queried` remote calls exceeds the budget
    pub fn budget_exceeded(&self, unavailable: usize, queried: usize) -> bool {
        match self.error_budget {
            Some(budget) if queried > 0 => unavailable as f64 / queried as f64 > budget,
            _ => false,
        }
    }
}
