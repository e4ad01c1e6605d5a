//! Conflicted decisions and the learning gate

pub mod state;
pub mod view;

pub use state::{CurationEvent, CurationState};
pub use view::{approve_message, truncate, ConflictCurationView, ConflictRow, LearningOutcome};
