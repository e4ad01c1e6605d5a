//! Payout Console - Decision lifecycle and human feedback workflow
//!
//! Operator console for a payout fraud-risk engine: review automated
//! decisions, curate contested ones into the learning signal, and reconcile
//! the resulting signal weight suggestions.

pub mod api;
pub mod constants;
pub mod logic;
