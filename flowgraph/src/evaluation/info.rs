//! Per-pass evaluation counters and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Cloneable cooperative-cancellation flag.
///
/// Cancellation is consulted by callers retrieving results and between
/// top-level evaluation requests; work that is already running is never
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Per-evaluation-pass record: how many nodes were considered, how many
/// actually recomputed, and an optional cancellation token.
///
/// Counters are atomic and taken through `&self` so a single info can be
/// shared across worker threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct EvalInfo {
    evaluations: AtomicU64,
    computes: AtomicU64,
    cancel: Option<CancelToken>,
}

impl EvalInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(token: CancelToken) -> Self {
        Self {
            cancel: Some(token),
            ..Self::default()
        }
    }

    /// Count a node being considered for evaluation.
    pub fn count_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a node actually recomputing. Called by nodes, not the engine.
    pub fn count_compute(&self) {
        self.computes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn computes(&self) -> u64 {
        self.computes.load(Ordering::Relaxed)
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}
