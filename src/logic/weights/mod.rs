//! Signal Weights
//!
//! `state` reconciles committed weights, the pending suggestion and operator
//! edits into display values; `reconciler` persists intent to the service.

pub mod reconciler;
pub mod state;

pub use reconciler::WeightSuggestionReconciler;
pub use state::{clamp_weight, parse_weight, WeightsEvent, WeightsState};
