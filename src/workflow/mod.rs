//! Two-stage generation workflow: draft, then QC/finalize.
//!
//! The coordinator owns the run state machine
//! (`Idle → Drafting → Reviewing → Idle`) and is its single writer.
//! Readers observe settled [`WorkflowRun`] snapshots over a watch channel
//! and discrete [`WorkflowEvent`]s over a broadcast channel. The review
//! call is never issued before the draft call has returned successfully;
//! that ordering is a correctness requirement, not an optimization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::card::{GenerationParameters, MethodCard, QcReport};
use crate::error::{Error, Result, Stage};
use crate::oracle::{GenerativeOracle, ParsePolicy, StructuredClient};

pub mod draft;
pub mod review;

pub use draft::DraftStage;
pub use review::{ReviewStage, ReviewedCard};

/// Discrete progress state of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Idle,
    Drafting,
    Reviewing,
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Drafting => write!(f, "drafting"),
            Self::Reviewing => write!(f, "reviewing"),
        }
    }
}

/// A finalized card and the audit that produced it, populated atomically.
///
/// Readers can never observe one without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRun {
    pub card: MethodCard,
    pub report: QcReport,
}

/// Snapshot of the workflow state, owned by the coordinator and read-only
/// for everyone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    /// Identifier of the current or most recent run
    pub id: Option<Uuid>,
    /// Parameters the run was submitted with
    pub parameters: Option<GenerationParameters>,
    pub step: WorkflowStep,
    /// The intermediate draft, present only while reviewing
    pub draft: Option<MethodCard>,
    /// Result of the most recent successful run
    pub outcome: Option<CompletedRun>,
    /// Failure of the most recent run; mutually exclusive with `outcome`
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    /// The initial snapshot: nothing submitted yet.
    pub fn idle() -> Self {
        Self {
            id: None,
            parameters: None,
            step: WorkflowStep::Idle,
            draft: None,
            outcome: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether a run is currently in flight.
    pub fn is_active(&self) -> bool {
        self.step != WorkflowStep::Idle
    }
}

/// Progress events emitted as the state machine transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    DraftingStarted,
    ReviewingStarted,
    RunCompleted,
    RunFailed { stage: Stage, message: String },
}

/// Cooperative cancellation token, checked at both external-call
/// boundaries. Clones share the same cancellation state.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // All senders gone without a cancellation; never resolve.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the workflow coordinator.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Deadline per stage call in milliseconds
    pub stage_timeout_ms: u64,
    /// How malformed oracle payloads are treated
    pub parse_policy: ParsePolicy,
    /// Model override for the draft stage
    pub draft_model: Option<String>,
    /// Model override for the review stage
    pub review_model: Option<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: 120_000,
            parse_policy: ParsePolicy::Strict,
            draft_model: None,
            review_model: None,
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.stage_timeout_ms = timeout_ms;
        self
    }

    pub fn with_parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    pub fn with_draft_model(mut self, model: impl Into<String>) -> Self {
        self.draft_model = Some(model.into());
        self
    }

    pub fn with_review_model(mut self, model: impl Into<String>) -> Self {
        self.review_model = Some(model.into());
        self
    }
}

/// Coordinator for the two-stage method-card workflow.
///
/// At most one run may be in flight at a time; re-submission while a run
/// is active is rejected without disturbing it.
pub struct MethodCardWorkflow {
    draft_stage: DraftStage,
    review_stage: ReviewStage,
    config: WorkflowConfig,
    state: watch::Sender<WorkflowRun>,
    events: broadcast::Sender<WorkflowEvent>,
    in_flight: AtomicBool,
}

impl MethodCardWorkflow {
    pub fn new(oracle: Arc<dyn GenerativeOracle>, config: WorkflowConfig) -> Self {
        let client = StructuredClient::new(oracle).with_policy(config.parse_policy);

        let mut draft_stage = DraftStage::new(client.clone());
        if let Some(model) = &config.draft_model {
            draft_stage = draft_stage.with_model(model.clone());
        }
        let mut review_stage = ReviewStage::new(client);
        if let Some(model) = &config.review_model {
            review_stage = review_stage.with_model(model.clone());
        }

        let (state, _) = watch::channel(WorkflowRun::idle());
        let (events, _) = broadcast::channel(32);

        Self {
            draft_stage,
            review_stage,
            config,
            state,
            events,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Latest settled snapshot.
    pub fn snapshot(&self) -> WorkflowRun {
        self.state.borrow().clone()
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowRun> {
        self.state.subscribe()
    }

    /// Subscribe to transition events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Run the full pipeline for the given parameters.
    pub async fn submit(&self, params: GenerationParameters) -> Result<CompletedRun> {
        self.submit_with_cancel(params, CancelToken::new()).await
    }

    /// Run the full pipeline, honoring the given cancellation token at
    /// both call boundaries.
    ///
    /// Invalid parameters are rejected before any state transition or
    /// external call; a submission while a run is in flight fails with
    /// [`Error::Busy`].
    pub async fn submit_with_cancel(
        &self,
        params: GenerationParameters,
        cancel: CancelToken,
    ) -> Result<CompletedRun> {
        params.validate()?;

        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;

        let result = self.execute(params, &cancel).await;
        self.in_flight.store(false, Ordering::Release);
        result
    }

    async fn execute(
        &self,
        params: GenerationParameters,
        cancel: &CancelToken,
    ) -> Result<CompletedRun> {
        let id = Uuid::new_v4();
        info!(%id, analyte = %params.analyte, matrix = %params.matrix, "run started");

        self.publish(WorkflowRun {
            id: Some(id),
            parameters: Some(params.clone()),
            step: WorkflowStep::Drafting,
            draft: None,
            outcome: None,
            error: None,
            updated_at: Utc::now(),
        });
        self.emit(WorkflowEvent::DraftingStarted);

        let draft = match self
            .guarded(cancel, self.draft_stage.run(&params))
            .await
            .map_err(|e| e.in_stage(Stage::Draft))
        {
            Ok(card) => card,
            Err(e) => return Err(self.fail(id, params, e)),
        };

        self.publish(WorkflowRun {
            id: Some(id),
            parameters: Some(params.clone()),
            step: WorkflowStep::Reviewing,
            draft: Some(draft.clone()),
            outcome: None,
            error: None,
            updated_at: Utc::now(),
        });
        self.emit(WorkflowEvent::ReviewingStarted);

        let reviewed = match self
            .guarded(cancel, self.review_stage.run(&draft))
            .await
            .map_err(|e| e.in_stage(Stage::Review))
        {
            Ok(reviewed) => reviewed,
            Err(e) => return Err(self.fail(id, params, e)),
        };

        let completed = CompletedRun {
            card: reviewed.card,
            report: reviewed.report,
        };
        info!(%id, is_ready = completed.report.is_ready, "run completed");

        // The draft is not retained once finalize succeeds.
        self.publish(WorkflowRun {
            id: Some(id),
            parameters: Some(params),
            step: WorkflowStep::Idle,
            draft: None,
            outcome: Some(completed.clone()),
            error: None,
            updated_at: Utc::now(),
        });
        self.emit(WorkflowEvent::RunCompleted);

        Ok(completed)
    }

    /// Collapse the run into the terminal error state. Any partial draft
    /// is discarded; the prior successful outcome is not restored.
    fn fail(&self, id: Uuid, params: GenerationParameters, error: Error) -> Error {
        let stage = error.stage().unwrap_or(Stage::Draft);
        warn!(%id, %stage, "run failed: {error}");

        self.publish(WorkflowRun {
            id: Some(id),
            parameters: Some(params),
            step: WorkflowStep::Idle,
            draft: None,
            outcome: None,
            error: Some(error.to_string()),
            updated_at: Utc::now(),
        });
        self.emit(WorkflowEvent::RunFailed {
            stage,
            message: error.to_string(),
        });
        error
    }

    /// Wrap a stage call with the per-call deadline and the cancellation
    /// boundary.
    async fn guarded<T>(
        &self,
        cancel: &CancelToken,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout_ms = self.config.stage_timeout_ms;
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), call) => {
                outcome.unwrap_or_else(|_| Err(Error::timeout(timeout_ms)))
            }
        }
    }

    fn publish(&self, run: WorkflowRun) {
        self.state.send_replace(run);
    }

    fn emit(&self, event: WorkflowEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}
