//! Extension hooks for watching pipeline runs.
//!
//! The pipeline stays storage-agnostic. Callers can inject an observer for
//! stage transitions (progress reporting) and per-comparison side effects
//! (audit traces). Observer errors are logged and never affect a run.

use std::future::Future;

use uuid::Uuid;

use crate::gateway::ModelRoute;
use crate::pipeline::StoryState;
use crate::tournament::{ComparisonRecord, MatchOutcome};
use crate::types::HeadlineId;

#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub run_id: Uuid,
    /// Source headline text.
    pub source: String,
    pub from: StoryState,
    pub to: StoryState,
    /// Reason, for transitions into `Aborted`.
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ComparisonEvent {
    pub run_id: Option<Uuid>,
    pub round: u32,
    pub headline_a: HeadlineId,
    pub headline_b: HeadlineId,
    pub seed_a: usize,
    pub seed_b: usize,
    pub judge: ModelRoute,
    pub outcome: MatchOutcome,
    pub attempts: u32,
    pub error: Option<String>,
}

impl ComparisonEvent {
    pub fn from_record(run_id: Option<Uuid>, record: &ComparisonRecord) -> Self {
        Self {
            run_id,
            round: record.round,
            headline_a: record.headline_a,
            headline_b: record.headline_b,
            seed_a: record.seed_a,
            seed_b: record.seed_b,
            judge: record.judge.clone(),
            outcome: record.outcome,
            attempts: record.attempts,
            error: record.error.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("{0}")]
    Message(String),
}

#[async_trait::async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn on_transition(&self, _event: TransitionEvent) -> Result<(), ObserverError> {
        Ok(())
    }

    async fn on_comparison(&self, _event: ComparisonEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Await an observer callback, logging rather than propagating failure.
pub(crate) async fn notify(fut: impl Future<Output = Result<(), ObserverError>>) {
    if let Err(err) = fut.await {
        tracing::warn!(error = %err, "pipeline observer failed");
    }
}
