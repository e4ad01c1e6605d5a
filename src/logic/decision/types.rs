//! Decision records and the human-review state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_HISTORY_DAYS, HISTORY_LIMIT};

// ============================================================================
// DECISIONS
// ============================================================================

/// Automated outcome produced by the risk engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Review,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Review => "review",
            Decision::Block => "block",
        }
    }

    /// The system side a human can accept or contest. `Review` has none.
    pub fn as_final(&self) -> Option<FinalDecision> {
        match self {
            Decision::Approve => Some(FinalDecision::Approve),
            Decision::Block => Some(FinalDecision::Block),
            Decision::Review => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "approve" => Some(Decision::Approve),
            "review" => Some(Decision::Review),
            "block" => Some(Decision::Block),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome a human can settle on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalDecision {
    Approve,
    Block,
}

impl FinalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalDecision::Approve => "approve",
            FinalDecision::Block => "block",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            FinalDecision::Approve => FinalDecision::Block,
            FinalDecision::Block => FinalDecision::Approve,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "approve" => Some(FinalDecision::Approve),
            "block" => Some(FinalDecision::Block),
            _ => None,
        }
    }
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One automated decision on a payout, with its human-resolution fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(alias = "decision_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub decision: Decision,
    pub risk_score: f64,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub regret_level: Option<String>,
    #[serde(default)]
    pub triggered_signals: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub counterfactuals: Vec<String>,
    #[serde(default)]
    pub human_final_decision: Option<FinalDecision>,
    #[serde(default)]
    pub human_overrode: bool,
    #[serde(default)]
    pub human_note: Option<String>,
}

/// Where a record sits in the human review lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReviewState {
    Pending,
    Accepted,
    Conflicted,
    Resolved,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewState::Pending)
    }
}

/// A human action on a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    Accept,
    Conflict { note: String },
    Resolve { final_decision: FinalDecision, note: Option<String> },
}

/// Which control is offered for a pending record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Accept,
    Conflict,
    Resolve,
}

impl ReviewAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ReviewAction::Accept => ActionKind::Accept,
            ReviewAction::Conflict { .. } => ActionKind::Conflict,
            ReviewAction::Resolve { .. } => ActionKind::Resolve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("decision {0} already has a human final decision")]
    AlreadyReviewed(String),
    #[error("decision {0} was routed to review and can only be resolved")]
    ResolutionRequired(String),
    #[error("decision {0} was not routed to review")]
    NotInReview(String),
    #[error("a note is required to contest a decision")]
    NoteRequired,
}

impl DecisionRecord {
    /// Fresh, unreviewed record created now.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        decision: Decision,
        risk_score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            decision,
            risk_score,
            confidence_score: 0.0,
            regret_level: None,
            triggered_signals: Vec::new(),
            reasons: Vec::new(),
            counterfactuals: Vec::new(),
            human_final_decision: None,
            human_overrode: false,
            human_note: None,
        }
    }

    pub fn review_state(&self) -> ReviewState {
        match self.human_final_decision {
            None => ReviewState::Pending,
            Some(_) if self.decision == Decision::Review => ReviewState::Resolved,
            Some(_) if self.human_overrode => ReviewState::Conflicted,
            Some(_) => ReviewState::Accepted,
        }
    }

    pub fn is_reviewed(&self) -> bool {
        self.human_final_decision.is_some()
    }

    /// Controls offered while the record is pending; none once it is settled.
    pub fn available_actions(&self) -> Vec<ActionKind> {
        if self.is_reviewed() {
            return Vec::new();
        }
        match self.decision {
            Decision::Review => vec![ActionKind::Resolve],
            Decision::Approve | Decision::Block => vec![ActionKind::Accept, ActionKind::Conflict],
        }
    }

    /// True when `final_decision` contradicts the system side of this record.
    pub fn overrides(&self, final_decision: FinalDecision) -> bool {
        self.decision
            .as_final()
            .map(|system| system != final_decision)
            .unwrap_or(false)
    }

    /// Legality of `action` against the current state, without mutating.
    pub fn check(&self, action: &ReviewAction) -> Result<(), TransitionError> {
        if self.is_reviewed() {
            return Err(TransitionError::AlreadyReviewed(self.id.clone()));
        }

        match action {
            ReviewAction::Accept => {
                if self.decision == Decision::Review {
                    return Err(TransitionError::ResolutionRequired(self.id.clone()));
                }
            }
            ReviewAction::Conflict { note } => {
                if self.decision == Decision::Review {
                    return Err(TransitionError::ResolutionRequired(self.id.clone()));
                }
                if note.trim().is_empty() {
                    return Err(TransitionError::NoteRequired);
                }
            }
            ReviewAction::Resolve { .. } => {
                if self.decision != Decision::Review {
                    return Err(TransitionError::NotInReview(self.id.clone()));
                }
            }
        }
        Ok(())
    }

    /// Enact `action` on this record. This is the rule set the workflow
    /// service applies; the console only ever observes its result.
    pub fn apply(&mut self, action: &ReviewAction) -> Result<(), TransitionError> {
        self.check(action)?;

        let final_decision = match action {
            ReviewAction::Accept => self.decision.as_final(),
            ReviewAction::Conflict { note } => {
                self.human_note = Some(note.trim().to_string());
                self.decision.as_final().map(|d| d.opposite())
            }
            ReviewAction::Resolve { final_decision, note } => {
                self.human_note = note
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                Some(*final_decision)
            }
        };

        self.human_final_decision = final_decision;
        self.human_overrode = final_decision.map(|d| self.overrides(d)).unwrap_or(false);
        Ok(())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// HISTORY FILTER
// ============================================================================

/// Filters for the decision history read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub days: u32,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            limit: HISTORY_LIMIT,
            decision: None,
            user_id: None,
            days: DEFAULT_HISTORY_DAYS,
        }
    }
}

impl HistoryFilter {
    /// Blank user ids mean "any user".
    pub fn with_user_id(mut self, raw: Option<&str>) -> Self {
        self.user_id = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_decision(mut self, decision: Option<Decision>) -> Self {
        self.decision = decision;
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days.max(1);
        self
    }

    pub fn matches(&self, record: &DecisionRecord, now: DateTime<Utc>) -> bool {
        let window_start = now - chrono::Duration::days(i64::from(self.days));
        record.created_at >= window_start
            && self.decision.map_or(true, |d| d == record.decision)
            && self.user_id.as_deref().map_or(true, |u| u == record.user_id)
    }
}
