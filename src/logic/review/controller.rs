//! Review Resolution Controller
//!
//! Enacts one human action per decision record. A record with a mutation in
//! flight is locked; repeated actions on it are no-ops until the mutation and
//! the history re-fetch that follows it have completed.

use std::sync::Arc;

use parking_lot::Mutex;

use super::state::{ReviewEvent, ReviewViewState};
use crate::logic::decision::{
    ActionKind, Decision, DecisionRecord, FinalDecision, HistoryFilter, ReviewAction, TransitionError,
};
use crate::logic::error::{ConsoleError, ConsoleResult};
use crate::logic::gateway::{
    ErrorKind, GatewayResult, HumanActionRequest, ResolveReviewRequest, WorkflowGateway,
};
use crate::logic::inflight::InFlightSet;
use crate::logic::status::RegionStatus;
use crate::logic::MutationOutcome;

pub struct ReviewResolutionController {
    gateway: Arc<dyn WorkflowGateway>,
    reviewer_id: String,
    state: Mutex<ReviewViewState>,
    in_flight: InFlightSet,
}

impl ReviewResolutionController {
    pub fn new(gateway: Arc<dyn WorkflowGateway>, reviewer_id: impl Into<String>) -> Self {
        Self {
            gateway,
            reviewer_id: reviewer_id.into(),
            state: Mutex::new(ReviewViewState::default()),
            in_flight: InFlightSet::new(),
        }
    }

    pub fn reviewer_id(&self) -> &str {
        &self.reviewer_id
    }

    pub fn snapshot(&self) -> ReviewViewState {
        self.state.lock().clone()
    }

    pub fn record(&self, decision_id: &str) -> Option<DecisionRecord> {
        self.state.lock().store.get(decision_id).cloned()
    }

    pub fn is_busy(&self, decision_id: &str) -> bool {
        self.in_flight.is_in_flight(decision_id)
    }

    /// Controls to offer for a record; none while it is locked or settled.
    pub fn available_actions(&self, decision_id: &str) -> Vec<ActionKind> {
        if self.is_busy(decision_id) {
            return Vec::new();
        }
        self.state
            .lock()
            .store
            .get(decision_id)
            .map(DecisionRecord::available_actions)
            .unwrap_or_default()
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Replace the store with a fresh read. Returns the number of rows received.
    pub async fn refresh(&self) -> ConsoleResult<usize> {
        let (tag, filter) = self.state.lock().begin_fetch();

        match self.gateway.fetch_history(&filter).await {
            Ok(records) => {
                let count = records.len();
                log::debug!("History fetch #{} returned {} records", tag, count);
                self.state.lock().reduce(ReviewEvent::HistoryLoaded { tag, records });
                Ok(count)
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                let message = match err.detail() {
                    Some(detail) => detail.to_string(),
                    None => "Failed to load payout history".to_string(),
                };
                log::warn!("History fetch #{} failed: {}", tag, err);
                self.state.lock().reduce(ReviewEvent::HistoryFailed {
                    tag,
                    status: RegionStatus::failed(&err, message),
                });
                Err(err)
            }
        }
    }

    pub async fn set_filter(&self, filter: HistoryFilter) -> ConsoleResult<usize> {
        self.state.lock().reduce(ReviewEvent::FilterChanged(filter));
        self.refresh().await
    }

    // ========================================================================
    // HUMAN ACTIONS
    // ========================================================================

    pub async fn accept(&self, decision_id: &str) -> ConsoleResult<MutationOutcome> {
        self.act(decision_id, ReviewAction::Accept).await
    }

    /// Contest the system outcome. The final decision sent is always the
    /// opposite of the system decision; a blank note never leaves the console.
    pub async fn conflict(&self, decision_id: &str, note: &str) -> ConsoleResult<MutationOutcome> {
        self.act(
            decision_id,
            ReviewAction::Conflict {
                note: note.to_string(),
            },
        )
        .await
    }

    pub async fn resolve(
        &self,
        decision_id: &str,
        final_decision: FinalDecision,
        note: Option<&str>,
    ) -> ConsoleResult<MutationOutcome> {
        self.act(
            decision_id,
            ReviewAction::Resolve {
                final_decision,
                note: note.map(str::to_string),
            },
        )
        .await
    }

    async fn act(&self, decision_id: &str, action: ReviewAction) -> ConsoleResult<MutationOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(decision_id) else {
            log::debug!("Decision {} already has an action in flight", decision_id);
            return Ok(MutationOutcome::Busy);
        };

        let system_decision = {
            let mut state = self.state.lock();
            let checked = match state.store.get(decision_id) {
                Some(record) => record
                    .check(&action)
                    .map(|_| record.decision)
                    .map_err(ConsoleError::from),
                None => Err(ConsoleError::UnknownDecision(decision_id.to_string())),
            };
            match checked {
                Ok(decision) => {
                    state.reduce(ReviewEvent::ActionStarted);
                    decision
                }
                Err(err) => {
                    log::warn!("Rejected {:?} on {} locally: {}", action.kind(), decision_id, err);
                    state.reduce(ReviewEvent::ActionFailed(RegionStatus::failed(&err, action_message(&err))));
                    return Err(err);
                }
            }
        };

        if let Err(e) = self.submit(decision_id, system_decision, &action).await {
            let err = ConsoleError::from(e);
            log::warn!("{:?} on {} failed: {}", action.kind(), decision_id, err);
            self.state
                .lock()
                .reduce(ReviewEvent::ActionFailed(RegionStatus::failed(&err, action_message(&err))));
            if err.needs_reread() {
                self.reread_after(&action, decision_id).await;
            }
            return Err(err);
        }

        log::info!("{:?} recorded for decision {}", action.kind(), decision_id);
        self.state.lock().reduce(ReviewEvent::ActionSucceeded);

        // The lock is held until the list reflects the server's view
        self.reread_after(&action, decision_id).await;
        Ok(MutationOutcome::Applied)
    }

    async fn reread_after(&self, action: &ReviewAction, decision_id: &str) {
        if let Err(e) = self.refresh().await {
            log::warn!("History refresh after {:?} on {} failed: {}", action.kind(), decision_id, e);
        }
    }

    async fn submit(
        &self,
        decision_id: &str,
        system_decision: Decision,
        action: &ReviewAction,
    ) -> GatewayResult<()> {
        match action {
            ReviewAction::Accept => {
                let request = HumanActionRequest::accept(decision_id, &self.reviewer_id);
                self.gateway.submit_human_action(&request).await
            }
            ReviewAction::Conflict { note } => {
                // check() has already ruled out review records
                let system = system_decision.as_final().unwrap_or(FinalDecision::Approve);
                let request = HumanActionRequest::conflict(decision_id, &self.reviewer_id, system.opposite(), note);
                self.gateway.submit_human_action(&request).await
            }
            ReviewAction::Resolve { final_decision, note } => {
                let request = ResolveReviewRequest::new(decision_id, *final_decision, note.as_deref());
                self.gateway.resolve_review(&request).await
            }
        }
    }

    // ========================================================================
    // RATIONALE
    // ========================================================================

    /// Why a record was routed to review. Cached after the first read.
    pub async fn explain_review(&self, decision_id: &str) -> ConsoleResult<String> {
        {
            let state = self.state.lock();
            if let Some(text) = state.rationales.get(decision_id) {
                return Ok(text.clone());
            }
            if let Some(record) = state.store.get(decision_id) {
                if record.decision != Decision::Review {
                    return Err(TransitionError::NotInReview(decision_id.to_string()).into());
                }
            }
        }

        let text = self.gateway.fetch_review_rationale(decision_id).await.map_err(|e| {
            log::warn!("Rationale for {} unavailable: {}", decision_id, e);
            ConsoleError::from(e)
        })?;

        self.state.lock().reduce(ReviewEvent::RationaleLoaded {
            decision_id: decision_id.to_string(),
            text: text.clone(),
        });
        Ok(text)
    }
}

/// Inline message for a failed human action.
pub fn action_message(err: &ConsoleError) -> String {
    match err.kind() {
        ErrorKind::Validation if err.is_local() => capitalize(&err.to_string()),
        ErrorKind::Validation => err.detail().unwrap_or("Invalid review action.").to_string(),
        ErrorKind::NotFound => "Decision not found.".to_string(),
        ErrorKind::UpstreamFailure => "Review saved but notification delivery failed.".to_string(),
        ErrorKind::Network | ErrorKind::Unknown => "Failed to submit review action.".to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}
