//! Decision Records
//!
//! Automated payout decisions and the human-resolution fields attached to them.
//! Pure data: transitions are driven by the review controller.

pub mod store;
pub mod types;

pub use store::{DecisionStore, EMPTY_HISTORY_MESSAGE};
pub use types::{
    ActionKind, Decision, DecisionRecord, FinalDecision, HistoryFilter, ReviewAction,
    ReviewState, TransitionError,
};
