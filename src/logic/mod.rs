//! Logic Module - Decision Lifecycle & Human Feedback
//!
//! ## Layout
//! - `decision/` - Decision records, history filter, store
//! - `gateway/` - Workflow service contract, HTTP client, in-memory service
//! - `review/` - Human review state machine per record
//! - `curation/` - Conflicted decisions and the learning gate
//! - `weights/` - Signal weight reconciliation

use serde::Serialize;

// Shared plumbing
pub mod error;
pub mod inflight;
pub mod sequence;
pub mod status;

// Views
pub mod curation;
pub mod decision;
pub mod gateway;
pub mod review;
pub mod weights;

pub use error::{ConsoleError, ConsoleResult};

/// What a mutation request turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// Sent and accepted by the service
    Applied,
    /// Another mutation holds the lock; nothing was sent
    Busy,
    /// Nothing to send (no pending edit or suggestion)
    Skipped,
}
