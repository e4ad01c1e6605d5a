//! In-Memory Workflow Service
//!
//! Holds decisions, conflicted reviews and the weights resource in process and
//! enforces the same rules as the live service. Used for offline demo mode and
//! as the service double in tests: every call is recorded, and a one-shot
//! failure can be injected per endpoint, either before or after the call takes
//! effect.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::error::{ErrorKind, GatewayError};
use super::types::*;
use super::{GatewayResult, WorkflowGateway};
use crate::constants::{WEIGHT_MAX, WEIGHT_MIN};
use crate::logic::decision::{Decision, DecisionRecord, HistoryFilter, ReviewAction, TransitionError};

/// Endpoint identity, for call assertions and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    Health,
    SubmitDecision,
    FetchHistory,
    SubmitHumanAction,
    ResolveReview,
    FetchReviewRationale,
    FetchWeights,
    PatchWeights,
    FetchConflicted,
    ApproveForLearning,
}

#[derive(Debug, Default)]
struct ServiceState {
    records: Vec<DecisionRecord>,
    conflicted: Vec<ConflictedDecision>,
    weights: WeightsResource,
    rationales: HashMap<String, String>,
    /// Proposal returned by the next learning approvals
    learning_suggestion: Option<WeightsMap>,
    calls: Vec<GatewayCall>,
    failures: HashMap<GatewayCall, GatewayError>,
    /// Returned after the write has been applied
    late_failures: HashMap<GatewayCall, GatewayError>,
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<ServiceState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, records: Vec<DecisionRecord>) -> Self {
        self.state.lock().records = records;
        self
    }

    pub fn with_weights(self, weights: WeightsResource) -> Self {
        self.state.lock().weights = weights;
        self
    }

    pub fn with_learning_suggestion(self, suggestion: WeightsMap) -> Self {
        self.state.lock().learning_suggestion = Some(suggestion);
        self
    }

    pub fn with_rationale(self, decision_id: &str, text: &str) -> Self {
        self.state
            .lock()
            .rationales
            .insert(decision_id.to_string(), text.to_string());
        self
    }

    /// The next call to `call` fails with `err`.
    pub fn fail_next(&self, call: GatewayCall, err: GatewayError) {
        self.state.lock().failures.insert(call, err);
    }

    /// The next call to `call` takes effect, then fails with `err`, as when
    /// a downstream step fails after the service has saved the write.
    pub fn fail_after_write(&self, call: GatewayCall, err: GatewayError) {
        self.state.lock().late_failures.insert(call, err);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, call: GatewayCall) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn record(&self, id: &str) -> Option<DecisionRecord> {
        self.state.lock().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn conflicted(&self) -> Vec<ConflictedDecision> {
        self.state.lock().conflicted.clone()
    }

    pub fn weights(&self) -> WeightsResource {
        self.state.lock().weights.clone()
    }

    /// Another administrator's write, landing outside this console.
    pub fn set_weights(&self, weights: WeightsResource) {
        self.state.lock().weights = weights;
    }

    /// Seeded service for offline use.
    pub fn demo() -> Self {
        let now = Utc::now();
        let mut records = vec![
            demo_record("dec_1001", "demo_user_1", 150.5, Decision::Approve, 12.0, now - Duration::hours(2)),
            demo_record("dec_1002", "demo_user_2", 980.0, Decision::Block, 91.0, now - Duration::hours(5)),
            demo_record("dec_1003", "demo_user_3", 420.0, Decision::Review, 58.0, now - Duration::days(1)),
            demo_record("dec_1004", "demo_user_4", 75.0, Decision::Block, 84.0, now - Duration::days(3)),
            demo_record("dec_1005", "demo_user_1", 2200.0, Decision::Review, 66.0, now - Duration::days(10)),
        ];

        records[1].triggered_signals = vec!["velocity".to_string(), "geo".to_string()];
        records[1].reasons = vec![
            "5 withdrawals in the last hour".to_string(),
            "IP country differs from expected country".to_string(),
        ];
        records[2].triggered_signals = vec!["new_payment_method".to_string()];
        records[2].reasons = vec!["Payment method added 0 days ago".to_string()];
        records[3].triggered_signals = vec!["no_trade_history".to_string()];
        records[3].reasons = vec!["No trades before first withdrawal".to_string()];

        let mut state = ServiceState {
            records,
            weights: WeightsResource {
                weights: weights_map(&[
                    ("geo", 20.0),
                    ("new_payment_method", 30.0),
                    ("no_trade_history", 35.0),
                    ("velocity", 40.0),
                    ("vpn", 15.0),
                ]),
                pending_suggestion: Some(weights_map(&[
                    ("geo", 20.0),
                    ("new_payment_method", 30.0),
                    ("no_trade_history", 35.0),
                    ("velocity", 55.0),
                    ("vpn", 15.0),
                ])),
                system_score: Some(72.0),
            },
            learning_suggestion: Some(weights_map(&[
                ("geo", 25.0),
                ("new_payment_method", 30.0),
                ("no_trade_history", 30.0),
                ("velocity", 40.0),
                ("vpn", 15.0),
            ])),
            ..Default::default()
        };

        // One record already contested, so curation has something to show
        let seeded = ReviewAction::Conflict {
            note: "Known customer, trades verified by support".to_string(),
        };
        if let Err(e) = state.apply_review("dec_1004", &seeded) {
            log::warn!("Demo seed conflict failed: {}", e);
        }

        Self {
            state: Mutex::new(state),
        }
    }

    /// Record the call and take any injected failure for it.
    async fn begin(&self, call: GatewayCall) -> GatewayResult<()> {
        {
            let mut state = self.state.lock();
            state.calls.push(call);
            if let Some(err) = state.failures.remove(&call) {
                return Err(err);
            }
        }
        // Suspension point, as a network round trip would be
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Hand back a write's result, or the failure queued to follow it.
    fn settle<T>(&self, call: GatewayCall, result: GatewayResult<T>) -> GatewayResult<T> {
        let value = result?;
        match self.state.lock().late_failures.remove(&call) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}

impl ServiceState {
    fn apply_review(&mut self, decision_id: &str, action: &ReviewAction) -> GatewayResult<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == decision_id)
            .ok_or_else(|| not_found("Decision not found"))?;

        record.apply(action).map_err(transition_rejected)?;

        if matches!(action, ReviewAction::Conflict { .. }) {
            let human_decision = record
                .human_final_decision
                .ok_or_else(|| GatewayError::new(ErrorKind::Unknown, "Conflict left no final decision"))?;

            let conflicted = ConflictedDecision {
                human_review_id: Uuid::new_v4().to_string(),
                decision_id: Some(record.id.clone()),
                system_decision: record.decision,
                human_decision,
                human_note: record.human_note.clone(),
                system_explanation: (!record.reasons.is_empty()).then(|| record.reasons.join("; ")),
                risk_score: record.risk_score,
                approved_for_learning: false,
                created_at: Some(record.created_at),
                reviewed_at: Some(Utc::now()),
                user_id: Some(record.user_id.clone()),
                payout_summary: Some(format!("{} {} payout by {}", record.amount, record.currency, record.user_id)),
                amount: Some(record.amount),
                currency: Some(record.currency.clone()),
                triggered_signals: record.triggered_signals.clone(),
                reasons: record.reasons.clone(),
            };
            self.conflicted.push(conflicted);
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowGateway for MemoryGateway {
    async fn health(&self) -> GatewayResult<()> {
        self.begin(GatewayCall::Health).await
    }

    async fn submit_decision(&self, _request: &PayoutDecisionRequest) -> GatewayResult<DecisionOutcome> {
        self.begin(GatewayCall::SubmitDecision).await?;
        Err(GatewayError::new(
            ErrorKind::Unknown,
            "Decisioning is not available from the in-memory service",
        ))
    }

    async fn fetch_history(&self, filter: &HistoryFilter) -> GatewayResult<Vec<DecisionRecord>> {
        self.begin(GatewayCall::FetchHistory).await?;
        let now = Utc::now();
        let state = self.state.lock();

        let mut records: Vec<DecisionRecord> = state
            .records
            .iter()
            .filter(|r| filter.matches(r, now))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(filter.limit as usize);
        Ok(records)
    }

    async fn submit_human_action(&self, request: &HumanActionRequest) -> GatewayResult<()> {
        self.begin(GatewayCall::SubmitHumanAction).await?;
        let result = {
            let mut state = self.state.lock();

            let action = match request.action {
                HumanActionKind::Accept => ReviewAction::Accept,
                HumanActionKind::Conflict => {
                    let system = state
                        .records
                        .iter()
                        .find(|r| r.id == request.decision_id)
                        .and_then(|r| r.decision.as_final());
                    if let (Some(system), Some(requested)) = (system, request.final_decision) {
                        if requested == system {
                            return Err(validation("final_decision must contradict the system decision"));
                        }
                    }
                    ReviewAction::Conflict {
                        note: request.note.clone().unwrap_or_default(),
                    }
                }
            };

            state.apply_review(&request.decision_id, &action)
        };
        self.settle(GatewayCall::SubmitHumanAction, result)
    }

    async fn resolve_review(&self, request: &ResolveReviewRequest) -> GatewayResult<()> {
        self.begin(GatewayCall::ResolveReview).await?;
        let action = ReviewAction::Resolve {
            final_decision: request.final_decision,
            note: request.note.clone(),
        };
        let result = self.state.lock().apply_review(&request.decision_id, &action);
        self.settle(GatewayCall::ResolveReview, result)
    }

    async fn fetch_review_rationale(&self, decision_id: &str) -> GatewayResult<String> {
        self.begin(GatewayCall::FetchReviewRationale).await?;
        let state = self.state.lock();

        let record = state
            .records
            .iter()
            .find(|r| r.id == decision_id)
            .ok_or_else(|| not_found("Decision not found"))?;
        if record.decision != Decision::Review {
            return Err(validation("Decision was not routed to review"));
        }

        if let Some(text) = state.rationales.get(decision_id) {
            return Ok(text.clone());
        }
        Ok(if record.reasons.is_empty() {
            format!("Risk score {} fell inside the manual review band.", record.risk_score)
        } else {
            format!("Routed to review: {}.", record.reasons.join("; "))
        })
    }

    async fn fetch_weights(&self) -> GatewayResult<WeightsResource> {
        self.begin(GatewayCall::FetchWeights).await?;
        Ok(self.state.lock().weights.clone())
    }

    async fn patch_weights(&self, weights: &WeightsMap) -> GatewayResult<WeightsResource> {
        self.begin(GatewayCall::PatchWeights).await?;

        if let Some((name, value)) = weights
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < WEIGHT_MIN || **v > WEIGHT_MAX)
        {
            return Err(validation(&format!(
                "Weight for {} must be between {} and {} (got {})",
                name, WEIGHT_MIN, WEIGHT_MAX, value
            )));
        }

        let resource = {
            let mut state = self.state.lock();
            state.weights.weights = weights.clone();
            state.weights.pending_suggestion = None;
            state.weights.clone()
        };
        self.settle(GatewayCall::PatchWeights, Ok(resource))
    }

    async fn fetch_conflicted(&self) -> GatewayResult<Vec<ConflictedDecision>> {
        self.begin(GatewayCall::FetchConflicted).await?;
        Ok(self.state.lock().conflicted.clone())
    }

    async fn approve_for_learning(&self, human_review_id: &str) -> GatewayResult<ApproveLearningResponse> {
        self.begin(GatewayCall::ApproveForLearning).await?;
        let response = {
            let mut state = self.state.lock();

            let suggestion = state.learning_suggestion.clone();
            let review = state
                .conflicted
                .iter_mut()
                .find(|c| c.human_review_id == human_review_id)
                .ok_or_else(|| not_found("Review not found"))?;

            if review.approved_for_learning {
                return Err(validation("Review already approved for learning"));
            }
            review.approved_for_learning = true;

            ApproveLearningResponse {
                suggested_weights: suggestion,
            }
        };
        self.settle(GatewayCall::ApproveForLearning, Ok(response))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn validation(message: &str) -> GatewayError {
    GatewayError::new(ErrorKind::Validation, message).with_status(400)
}

fn not_found(message: &str) -> GatewayError {
    GatewayError::new(ErrorKind::NotFound, message).with_status(404)
}

fn transition_rejected(err: TransitionError) -> GatewayError {
    validation(&err.to_string())
}

pub fn weights_map(pairs: &[(&str, f64)]) -> WeightsMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn demo_record(
    id: &str,
    user_id: &str,
    amount: f64,
    decision: Decision,
    risk_score: f64,
    created_at: chrono::DateTime<Utc>,
) -> DecisionRecord {
    let mut record = DecisionRecord::new(id, user_id, amount, "USD", decision, risk_score);
    record.created_at = created_at;
    record.confidence_score = if decision == Decision::Review { 0.55 } else { 0.85 };
    record.regret_level = Some(if risk_score > 80.0 { "low" } else { "medium" }.to_string());
    if decision == Decision::Approve {
        record.counterfactuals = vec!["Would be reviewed above 1000 USD".to_string()];
    }
    record
}
