//! Wire types of the workflow service

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::decision::{Decision, FinalDecision};

// ============================================================================
// WEIGHTS
// ============================================================================

/// Signal name -> weight in [0, 100]
pub type WeightsMap = BTreeMap<String, f64>;

/// The weights resource as served by `GET`/`PATCH /admin/weights`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsResource {
    #[serde(default)]
    pub weights: WeightsMap,
    /// Engine-proposed configuration awaiting apply/dismiss
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_suggestion: Option<WeightsMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_score: Option<f64>,
}

impl WeightsResource {
    pub fn has_pending_suggestion(&self) -> bool {
        self.pending_suggestion.as_ref().map_or(false, |s| !s.is_empty())
    }
}

/// The patch contract takes the complete map under `signal_weights`
#[derive(Debug, Serialize)]
pub struct PatchWeightsRequest<'a> {
    pub signal_weights: &'a WeightsMap,
}

// ============================================================================
// CONFLICTED DECISIONS
// ============================================================================

/// Curation-side projection of a decision a human contested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictedDecision {
    pub human_review_id: String,
    #[serde(default)]
    pub decision_id: Option<String>,
    pub system_decision: Decision,
    pub human_decision: FinalDecision,
    #[serde(default)]
    pub human_note: Option<String>,
    #[serde(default)]
    pub system_explanation: Option<String>,
    pub risk_score: f64,
    #[serde(default)]
    pub approved_for_learning: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub payout_summary: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub triggered_signals: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl ConflictedDecision {
    pub fn when(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.reviewed_at)
    }

    pub fn who(&self) -> Option<&str> {
        self.user_id.as_deref().or(self.payout_summary.as_deref())
    }

    /// "250 USD" when both parts are known, else the free-text summary.
    pub fn payout_label(&self) -> Option<String> {
        match (self.amount, self.currency.as_deref()) {
            (Some(amount), Some(currency)) => Some(format!("{} {}", amount, currency)),
            _ => self.payout_summary.clone(),
        }
    }
}

/// Accepted on read: a bare array or an object wrapping it
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConflictedList {
    Bare(Vec<ConflictedDecision>),
    Wrapped { conflicted_decisions: Vec<ConflictedDecision> },
}

impl ConflictedList {
    pub fn into_vec(self) -> Vec<ConflictedDecision> {
        match self {
            ConflictedList::Bare(list) => list,
            ConflictedList::Wrapped { conflicted_decisions } => conflicted_decisions,
        }
    }
}

/// Response of the approve-for-learning call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApproveLearningResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_weights: Option<WeightsMap>,
}

// ============================================================================
// HUMAN ACTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanActionKind {
    Accept,
    Conflict,
}

/// Body of `POST /payout/human-review`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanActionRequest {
    pub decision_id: String,
    pub reviewer_id: String,
    pub action: HumanActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<FinalDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HumanActionRequest {
    pub fn accept(decision_id: &str, reviewer_id: &str) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            action: HumanActionKind::Accept,
            final_decision: None,
            note: None,
        }
    }

    pub fn conflict(decision_id: &str, reviewer_id: &str, final_decision: FinalDecision, note: &str) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            action: HumanActionKind::Conflict,
            final_decision: Some(final_decision),
            note: Some(note.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveActionKind {
    Resolve,
}

/// Body of `POST /payout/resolve-review`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveReviewRequest {
    pub decision_id: String,
    pub action: ResolveActionKind,
    pub final_decision: FinalDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ResolveReviewRequest {
    pub fn new(decision_id: &str, final_decision: FinalDecision, note: Option<&str>) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            action: ResolveActionKind::Resolve,
            final_decision,
            note: note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        }
    }
}

/// Rationale responses: a JSON string, an object, or plain text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RationaleBody {
    Text(String),
    Object {
        #[serde(alias = "rationale", alias = "reason")]
        explanation: String,
    },
}

impl RationaleBody {
    pub fn into_text(self) -> String {
        match self {
            RationaleBody::Text(text) => text,
            RationaleBody::Object { explanation } => explanation,
        }
    }
}

// ============================================================================
// DECISION REQUESTS (opaque to the workflow)
// ============================================================================

/// Payload for `POST /payout/decision`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutDecisionRequest {
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method_id: String,
    pub payment_method_age_days: u32,
    pub country: String,
    pub expected_country: String,
    pub ip_address: String,
    pub vpn_detected: bool,
    pub total_trades: u32,
    pub total_trade_volume: f64,
    pub withdrawals_last_1h: u32,
    pub withdrawals_last_24h: u32,
    pub deposits_last_1h: u32,
}

impl Default for PayoutDecisionRequest {
    fn default() -> Self {
        Self {
            user_id: "demo_user_1".to_string(),
            amount: 150.5,
            currency: "USD".to_string(),
            payment_method_id: "pm_1".to_string(),
            payment_method_age_days: 10,
            country: "US".to_string(),
            expected_country: "US".to_string(),
            ip_address: "192.168.1.10".to_string(),
            vpn_detected: false,
            total_trades: 5,
            total_trade_volume: 500.0,
            withdrawals_last_1h: 0,
            withdrawals_last_24h: 2,
            deposits_last_1h: 0,
        }
    }
}

/// Outcome of a decision request. Only the workflow-relevant fields are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    #[serde(default, alias = "id")]
    pub decision_id: Option<String>,
    pub decision: Decision,
    pub risk_score: f64,
    #[serde(default)]
    pub triggered_signals: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
