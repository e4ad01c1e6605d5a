//! Conflict Curation View
//!
//! Read model over decisions a human contested, plus the gate that promotes
//! one of them into the engine's learning signal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::state::{CurationEvent, CurationState};
use crate::logic::decision::{Decision, FinalDecision};
use crate::logic::error::{ConsoleError, ConsoleResult};
use crate::logic::gateway::{ConflictedDecision, ErrorKind, WeightsMap, WorkflowGateway};
use crate::logic::inflight::InFlightSet;
use crate::logic::status::RegionStatus;

const NOTE_PREVIEW_CHARS: usize = 60;
const EXPLANATION_PREVIEW_CHARS: usize = 80;

/// Result of a learning approval
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "suggested_weights", rename_all = "snake_case")]
pub enum LearningOutcome {
    /// The engine proposed a weights configuration
    Proposed(WeightsMap),
    /// Approved, nothing to propose
    NoProposal,
    /// An approval for this review is already in flight
    Busy,
}

/// One line of the conflicted list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRow {
    pub human_review_id: String,
    pub when: Option<DateTime<Utc>>,
    pub who: String,
    pub payout: String,
    pub system_decision: Decision,
    pub human_decision: FinalDecision,
    pub risk_score: f64,
    pub note: String,
    pub explanation: String,
    pub approved_for_learning: bool,
}

impl ConflictRow {
    pub fn from_decision(item: &ConflictedDecision) -> Self {
        Self {
            human_review_id: item.human_review_id.clone(),
            when: item.when(),
            who: truncate(item.who(), 32),
            payout: truncate(item.payout_label().as_deref(), 32),
            system_decision: item.system_decision,
            human_decision: item.human_decision,
            risk_score: item.risk_score,
            note: truncate(item.human_note.as_deref(), NOTE_PREVIEW_CHARS),
            explanation: truncate(item.system_explanation.as_deref(), EXPLANATION_PREVIEW_CHARS),
            approved_for_learning: item.approved_for_learning,
        }
    }
}

/// Shorten for list display. Missing or empty text renders as an em dash.
pub fn truncate(text: Option<&str>, max: usize) -> String {
    match text {
        Some(s) if !s.is_empty() => {
            if s.chars().count() > max {
                let head: String = s.chars().take(max).collect();
                format!("{}…", head)
            } else {
                s.to_string()
            }
        }
        _ => "—".to_string(),
    }
}

pub struct ConflictCurationView {
    gateway: Arc<dyn WorkflowGateway>,
    state: Mutex<CurationState>,
    in_flight: InFlightSet,
}

impl ConflictCurationView {
    pub fn new(gateway: Arc<dyn WorkflowGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(CurationState::default()),
            in_flight: InFlightSet::new(),
        }
    }

    pub fn snapshot(&self) -> CurationState {
        self.state.lock().clone()
    }

    pub fn items(&self) -> Vec<ConflictedDecision> {
        self.state.lock().items.clone()
    }

    pub fn rows(&self) -> Vec<ConflictRow> {
        self.state.lock().items.iter().map(ConflictRow::from_decision).collect()
    }

    /// Full entry, for the details popup.
    pub fn details(&self, human_review_id: &str) -> Option<ConflictedDecision> {
        self.state.lock().get(human_review_id).cloned()
    }

    pub fn is_approving(&self, human_review_id: &str) -> bool {
        self.in_flight.is_in_flight(&approve_key(human_review_id))
    }

    pub async fn refresh(&self) -> ConsoleResult<usize> {
        let tag = self.state.lock().begin_fetch();

        match self.gateway.fetch_conflicted().await {
            Ok(items) => {
                let count = items.len();
                self.state.lock().reduce(CurationEvent::ListLoaded { tag, items });
                Ok(count)
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                let message = match err.kind() {
                    ErrorKind::NotFound => "Conflicted decisions endpoint not found.",
                    _ => "Failed to load conflicted decisions.",
                };
                log::warn!("Conflicted list fetch failed: {}", err);
                self.state.lock().reduce(CurationEvent::ListFailed {
                    tag,
                    status: RegionStatus::failed(&err, message),
                });
                Err(err)
            }
        }
    }

    /// Promote a conflicted decision into the learning signal.
    ///
    /// The flag is one-way: an entry known to be approved is refused without a
    /// request, and the service refuses a second approval it sees. When the
    /// service may have moved on without us, the list is re-read.
    pub async fn approve_for_learning(&self, human_review_id: &str) -> ConsoleResult<LearningOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(&approve_key(human_review_id)) else {
            return Ok(LearningOutcome::Busy);
        };

        {
            let mut state = self.state.lock();
            if state.get(human_review_id).map_or(false, |c| c.approved_for_learning) {
                let err = ConsoleError::AlreadyApproved(human_review_id.to_string());
                log::warn!("{}", err);
                state.reduce(CurationEvent::ApproveFailed(RegionStatus::failed(&err, approve_message(&err))));
                return Err(err);
            }
            state.reduce(CurationEvent::ApproveStarted);
        }

        match self.gateway.approve_for_learning(human_review_id).await {
            Ok(response) => {
                log::info!("Review {} approved for learning", human_review_id);
                self.state.lock().reduce(CurationEvent::Approved {
                    human_review_id: human_review_id.to_string(),
                });

                Ok(match response.suggested_weights {
                    Some(weights) if !weights.is_empty() => LearningOutcome::Proposed(weights),
                    _ => LearningOutcome::NoProposal,
                })
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                log::warn!("Approve for learning on {} failed: {}", human_review_id, err);
                self.state
                    .lock()
                    .reduce(CurationEvent::ApproveFailed(RegionStatus::failed(&err, approve_message(&err))));
                if err.needs_reread() {
                    if let Err(e) = self.refresh().await {
                        log::warn!("Conflicted list refresh after approval failure failed: {}", e);
                    }
                }
                Err(err)
            }
        }
    }
}

fn approve_key(human_review_id: &str) -> String {
    format!("learning:{}", human_review_id)
}

pub fn approve_message(err: &ConsoleError) -> &'static str {
    match err.kind() {
        ErrorKind::Validation => "Invalid request (e.g. already approved).",
        ErrorKind::NotFound => "Review not found.",
        ErrorKind::UpstreamFailure => "Learning approved but a downstream integration failed.",
        ErrorKind::Network | ErrorKind::Unknown => "Failed to approve for learning.",
    }
}
