//! Workflow Gateway - Console to Workflow Service Communication
//!
//! The sole point of contact with the remote service. Every call is a single
//! request/response with no implicit retry; callers decide whether to re-fetch
//! after a mutation.
//!
//! Implementations:
//! - `HttpGateway` - reqwest client against the live service
//! - `MemoryGateway` - in-process service used offline and in tests

pub mod client;
pub mod error;
pub mod memory;
pub mod types;

pub use client::{GatewayConfig, HttpGateway};
pub use error::{ErrorKind, GatewayError};
pub use memory::{GatewayCall, MemoryGateway};
pub use types::*;

use async_trait::async_trait;

use crate::logic::decision::{DecisionRecord, HistoryFilter};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait WorkflowGateway: Send + Sync {
    /// Liveness of the service
    async fn health(&self) -> GatewayResult<()>;

    /// Request an automated decision (outcome is opaque to the workflow)
    async fn submit_decision(&self, request: &PayoutDecisionRequest) -> GatewayResult<DecisionOutcome>;

    async fn fetch_history(&self, filter: &HistoryFilter) -> GatewayResult<Vec<DecisionRecord>>;

    /// Accept or contest an approve/block decision
    async fn submit_human_action(&self, request: &HumanActionRequest) -> GatewayResult<()>;

    /// Settle a decision that was routed to review
    async fn resolve_review(&self, request: &ResolveReviewRequest) -> GatewayResult<()>;

    /// Human-readable reason a decision was routed to review
    async fn fetch_review_rationale(&self, decision_id: &str) -> GatewayResult<String>;

    async fn fetch_weights(&self) -> GatewayResult<WeightsResource>;

    /// Replace the committed weights with `weights` (complete map)
    async fn patch_weights(&self, weights: &WeightsMap) -> GatewayResult<WeightsResource>;

    async fn fetch_conflicted(&self) -> GatewayResult<Vec<ConflictedDecision>>;

    async fn approve_for_learning(&self, human_review_id: &str) -> GatewayResult<ApproveLearningResponse>;
}

#[cfg(test)]
mod tests;
