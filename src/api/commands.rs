//! Console Commands - Operator command surface
//!
//! One method per operator action. Each returns a serializable view or a
//! `CommandError` carrying the message the view would show inline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::logic::curation::{ConflictCurationView, ConflictRow, LearningOutcome};
use crate::logic::decision::{
    ActionKind, DecisionRecord, FinalDecision, HistoryFilter, ReviewState, EMPTY_HISTORY_MESSAGE,
};
use crate::logic::gateway::{
    ConflictedDecision, DecisionOutcome, ErrorKind, GatewayConfig, GatewayError, HttpGateway, MemoryGateway,
    PayoutDecisionRequest, WeightsMap, WorkflowGateway,
};
use crate::logic::review::ReviewResolutionController;
use crate::logic::status::RegionStatus;
use crate::logic::weights::WeightSuggestionReconciler;
use crate::logic::{ConsoleError, MutationOutcome};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Failure as shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    /// Rejected before any request was sent
    pub local: bool,
}

impl CommandError {
    /// Prefer the message the view recorded for this failure.
    fn from_view(err: ConsoleError, status: &RegionStatus) -> Self {
        let message = status
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        Self::with_message(err, message)
    }

    fn with_message(err: ConsoleError, message: String) -> Self {
        let details = match &err {
            ConsoleError::Gateway(e) => e.details.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind(),
            message,
            details,
            local: err.is_local(),
        }
    }
}

impl From<ConsoleError> for CommandError {
    fn from(err: ConsoleError) -> Self {
        let message = err.to_string();
        Self::with_message(err, message)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub mode: &'static str,
    pub reviewer_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    #[serde(flatten)]
    pub record: DecisionRecord,
    pub review_state: ReviewState,
    pub available_actions: Vec<ActionKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub filter: HistoryFilter,
    pub records: Vec<HistoryRow>,
    pub last_refreshed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub outcome: MutationOutcome,
    /// The record as re-read after the action
    pub record: Option<DecisionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightRow {
    pub signal: String,
    pub committed: Option<f64>,
    pub display: f64,
    pub suggested: Option<f64>,
    pub edited: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightsView {
    pub signals: Vec<WeightRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_suggestion: Option<WeightsMap>,
    /// Proposal from the last learning approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_weights: Option<WeightsMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_score: Option<f64>,
    pub has_pending_edit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightsChange {
    pub outcome: MutationOutcome,
    pub weights: WeightsView,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningResult {
    pub outcome: LearningOutcome,
    pub weights: WeightsView,
}

// ============================================================================
// CONSOLE
// ============================================================================

pub struct Console {
    gateway: Arc<dyn WorkflowGateway>,
    mode: &'static str,
    review: ReviewResolutionController,
    curation: ConflictCurationView,
    weights: WeightSuggestionReconciler,
}

impl Console {
    pub fn new(gateway: Arc<dyn WorkflowGateway>, reviewer_id: &str) -> Self {
        Self {
            review: ReviewResolutionController::new(Arc::clone(&gateway), reviewer_id),
            curation: ConflictCurationView::new(Arc::clone(&gateway)),
            weights: WeightSuggestionReconciler::new(Arc::clone(&gateway)),
            gateway,
            mode: "online",
        }
    }

    /// Console against the live workflow service.
    pub fn connect(config: GatewayConfig, reviewer_id: &str) -> Result<Self, GatewayError> {
        log::info!("Connecting to workflow service at {}", config.base_url);
        let gateway = HttpGateway::new(config)?;
        Ok(Self::new(Arc::new(gateway), reviewer_id))
    }

    /// Console against a seeded in-memory service.
    pub fn offline(reviewer_id: &str) -> Self {
        log::info!("Running offline against the in-memory demo service");
        let mut console = Self::new(Arc::new(MemoryGateway::demo()), reviewer_id);
        console.mode = "offline";
        console
    }

    pub fn review(&self) -> &ReviewResolutionController {
        &self.review
    }

    pub fn curation(&self) -> &ConflictCurationView {
        &self.curation
    }

    pub fn weights(&self) -> &WeightSuggestionReconciler {
        &self.weights
    }

    pub async fn health(&self) -> CommandResult<HealthReport> {
        self.gateway
            .health()
            .await
            .map_err(|e| CommandError::from(ConsoleError::from(e)))?;
        Ok(HealthReport {
            status: "ok",
            mode: self.mode,
            reviewer_id: self.review.reviewer_id().to_string(),
        })
    }

    /// Request an automated decision. The outcome is passed through as-is.
    pub async fn submit_decision(&self, request: &PayoutDecisionRequest) -> CommandResult<DecisionOutcome> {
        let outcome = self
            .gateway
            .submit_decision(request)
            .await
            .map_err(|e| CommandError::from(ConsoleError::from(e)))?;
        log::info!(
            "Decision for {}: {} (risk {})",
            request.user_id,
            outcome.decision,
            outcome.risk_score
        );
        Ok(outcome)
    }

    // ========================================================================
    // HISTORY & REVIEW
    // ========================================================================

    /// Load the history, optionally with a new filter.
    pub async fn load_history(&self, filter: Option<HistoryFilter>) -> CommandResult<HistoryView> {
        let result = match filter {
            Some(filter) => self.review.set_filter(filter).await,
            None => self.review.refresh().await,
        };
        if let Err(e) = result {
            return Err(CommandError::from_view(e, &self.review.snapshot().history_status));
        }
        Ok(self.history_view())
    }

    pub fn history_view(&self) -> HistoryView {
        let snapshot = self.review.snapshot();
        let records: Vec<HistoryRow> = snapshot
            .store
            .records()
            .iter()
            .map(|record| HistoryRow {
                review_state: record.review_state(),
                available_actions: self.review.available_actions(&record.id),
                record: record.clone(),
            })
            .collect();

        HistoryView {
            filter: snapshot.filter,
            empty_message: records.is_empty().then_some(EMPTY_HISTORY_MESSAGE),
            records,
            last_refreshed: snapshot.store.last_refreshed(),
        }
    }

    pub async fn accept(&self, decision_id: &str) -> CommandResult<ActionResult> {
        let result = self.review.accept(decision_id).await;
        self.action_result(decision_id, result)
    }

    pub async fn conflict(&self, decision_id: &str, note: &str) -> CommandResult<ActionResult> {
        let result = self.review.conflict(decision_id, note).await;
        self.action_result(decision_id, result)
    }

    pub async fn resolve(
        &self,
        decision_id: &str,
        final_decision: FinalDecision,
        note: Option<&str>,
    ) -> CommandResult<ActionResult> {
        let result = self.review.resolve(decision_id, final_decision, note).await;
        self.action_result(decision_id, result)
    }

    fn action_result(
        &self,
        decision_id: &str,
        result: Result<MutationOutcome, ConsoleError>,
    ) -> CommandResult<ActionResult> {
        match result {
            Ok(outcome) => Ok(ActionResult {
                outcome,
                record: self.review.record(decision_id),
            }),
            Err(e) => Err(CommandError::from_view(e, &self.review.snapshot().action_status)),
        }
    }

    pub async fn review_rationale(&self, decision_id: &str) -> CommandResult<String> {
        Ok(self.review.explain_review(decision_id).await?)
    }

    // ========================================================================
    // WEIGHTS
    // ========================================================================

    pub async fn load_weights(&self) -> CommandResult<WeightsView> {
        if let Err(e) = self.weights.refresh().await {
            return Err(CommandError::from_view(e, &self.weights.snapshot().load_status));
        }
        Ok(self.weights_view())
    }

    pub fn weights_view(&self) -> WeightsView {
        let snapshot = self.weights.snapshot();
        let display = snapshot.display_weights();
        let committed = snapshot.committed();
        let pending = snapshot.pending_suggestion();

        let signals = display
            .iter()
            .map(|(name, value)| WeightRow {
                signal: name.clone(),
                committed: committed.and_then(|w| w.get(name)).copied(),
                display: *value,
                suggested: pending.and_then(|s| s.get(name)).copied(),
                edited: snapshot.overlay.contains_key(name),
            })
            .collect();

        WeightsView {
            signals,
            pending_suggestion: pending.cloned(),
            suggested_weights: snapshot.suggested.clone(),
            system_score: snapshot.resource.as_ref().and_then(|r| r.system_score),
            has_pending_edit: snapshot.has_pending_edit(),
        }
    }

    pub fn edit_weight(&self, signal: &str, raw: &str) -> CommandResult<WeightsView> {
        self.weights.edit(signal, raw)?;
        Ok(self.weights_view())
    }

    pub async fn save_weights(&self) -> CommandResult<WeightsChange> {
        let result = self.weights.save_manual().await;
        self.weights_change(result)
    }

    pub async fn apply_suggestion(&self) -> CommandResult<WeightsChange> {
        let result = self.weights.apply_suggestion().await;
        self.weights_change(result)
    }

    pub fn dismiss_suggestion(&self) -> WeightsView {
        self.weights.dismiss_suggestion();
        self.weights_view()
    }

    pub async fn apply_suggested(&self) -> CommandResult<WeightsChange> {
        let result = self.weights.apply_suggested().await;
        self.weights_change(result)
    }

    pub async fn dismiss_suggested(&self) -> CommandResult<WeightsView> {
        if let Err(e) = self.weights.dismiss_suggested().await {
            return Err(CommandError::from_view(e, &self.weights.snapshot().load_status));
        }
        Ok(self.weights_view())
    }

    fn weights_change(&self, result: Result<MutationOutcome, ConsoleError>) -> CommandResult<WeightsChange> {
        match result {
            Ok(outcome) => Ok(WeightsChange {
                outcome,
                weights: self.weights_view(),
            }),
            Err(e) => Err(CommandError::from_view(e, &self.weights.snapshot().patch_status)),
        }
    }

    // ========================================================================
    // CURATION
    // ========================================================================

    pub async fn load_conflicted(&self) -> CommandResult<Vec<ConflictRow>> {
        if let Err(e) = self.curation.refresh().await {
            return Err(CommandError::from_view(e, &self.curation.snapshot().list_status));
        }
        Ok(self.curation.rows())
    }

    pub fn conflict_details(&self, human_review_id: &str) -> CommandResult<ConflictedDecision> {
        self.curation.details(human_review_id).ok_or_else(|| CommandError {
            kind: ErrorKind::NotFound,
            message: "Review not found.".to_string(),
            details: Vec::new(),
            local: true,
        })
    }

    /// Approve for learning, then either present the engine's proposal or,
    /// when there is none, re-read the committed weights.
    pub async fn approve_for_learning(&self, human_review_id: &str) -> CommandResult<LearningResult> {
        let outcome = match self.curation.approve_for_learning(human_review_id).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(CommandError::from_view(e, &self.curation.snapshot().approve_status)),
        };

        match &outcome {
            LearningOutcome::Proposed(weights) => self.weights.present_suggested(weights.clone()),
            LearningOutcome::NoProposal => {
                if let Err(e) = self.weights.refresh().await {
                    log::warn!("Weights refresh after learning approval failed: {}", e);
                }
            }
            LearningOutcome::Busy => {}
        }

        Ok(LearningResult {
            outcome,
            weights: self.weights_view(),
        })
    }
}
