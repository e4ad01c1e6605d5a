//! Human review of automated decisions
//!
//! `state` holds the view and its reducer, `controller` drives the per-record
//! state machine against the workflow service.

pub mod controller;
pub mod state;

pub use controller::{action_message, ReviewResolutionController};
pub use state::{ReviewEvent, ReviewViewState};
