//! Weight Suggestion Reconciler
//!
//! Three sources feed the weight shown for a signal: the committed value, a
//! pending suggestion held by the service, and the operator's unsaved edit.
//! Nothing is merged with the service: every write sends a complete map and
//! adopts whatever the service returns.

use std::sync::Arc;

use parking_lot::Mutex;

use super::state::{parse_weight, WeightsEvent, WeightsState};
use crate::logic::error::{ConsoleError, ConsoleResult};
use crate::logic::gateway::{ErrorKind, WeightsMap, WorkflowGateway};
use crate::logic::inflight::InFlightSet;
use crate::logic::status::RegionStatus;
use crate::logic::MutationOutcome;

/// Every write path goes through this one lock
const PATCH_KEY: &str = "weights:patch";

pub struct WeightSuggestionReconciler {
    gateway: Arc<dyn WorkflowGateway>,
    state: Mutex<WeightsState>,
    in_flight: InFlightSet,
}

impl WeightSuggestionReconciler {
    pub fn new(gateway: Arc<dyn WorkflowGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(WeightsState::default()),
            in_flight: InFlightSet::new(),
        }
    }

    pub fn snapshot(&self) -> WeightsState {
        self.state.lock().clone()
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.state.lock().signal_names()
    }

    pub fn display_weights(&self) -> WeightsMap {
        self.state.lock().display_weights()
    }

    pub fn pending_suggestion(&self) -> Option<WeightsMap> {
        self.state.lock().pending_suggestion().cloned()
    }

    pub fn suggested(&self) -> Option<WeightsMap> {
        self.state.lock().suggested.clone()
    }

    pub fn system_score(&self) -> Option<f64> {
        self.state.lock().resource.as_ref().and_then(|r| r.system_score)
    }

    /// Gates the Save control.
    pub fn has_pending_edit(&self) -> bool {
        self.state.lock().has_pending_edit()
    }

    pub fn is_patching(&self) -> bool {
        self.in_flight.is_in_flight(PATCH_KEY)
    }

    pub async fn refresh(&self) -> ConsoleResult<()> {
        let tag = self.state.lock().begin_fetch();

        match self.gateway.fetch_weights().await {
            Ok(resource) => {
                log::debug!("Weights fetch #{} returned {} signals", tag, resource.weights.len());
                self.state.lock().reduce(WeightsEvent::Loaded { tag, resource });
                Ok(())
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                let message = match err.kind() {
                    ErrorKind::NotFound => "Weights endpoint not found.",
                    _ => "Failed to load signal weights.",
                };
                log::warn!("Weights fetch #{} failed: {}", tag, err);
                self.state.lock().reduce(WeightsEvent::LoadFailed {
                    tag,
                    status: RegionStatus::failed(&err, message),
                });
                Err(err)
            }
        }
    }

    /// Hold an edit for `signal`. The raw text is clamped now, so the overlay
    /// is always a valid configuration. Returns the value held.
    pub fn edit(&self, signal: &str, raw: &str) -> ConsoleResult<f64> {
        let mut state = self.state.lock();
        if !state.signal_names().iter().any(|name| name == signal) {
            return Err(ConsoleError::UnknownSignal(signal.to_string()));
        }

        let value = parse_weight(raw);
        state.reduce(WeightsEvent::Edited {
            signal: signal.to_string(),
            value,
        });
        Ok(value)
    }

    /// Drop the pending suggestion from this view only.
    pub fn dismiss_suggestion(&self) {
        log::info!("Pending weight suggestion dismissed locally");
        self.state.lock().reduce(WeightsEvent::SuggestionDismissed);
    }

    /// Commit the service's pending suggestion as the new weights.
    pub async fn apply_suggestion(&self) -> ConsoleResult<MutationOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(PATCH_KEY) else {
            return Ok(MutationOutcome::Busy);
        };
        let Some(suggestion) = self.pending_suggestion() else {
            return Ok(MutationOutcome::Skipped);
        };

        let result = self.patch(&suggestion, "Failed to apply suggestion.").await;
        self.reread_if_landed(&result).await;
        result?;
        log::info!("Applied pending weight suggestion ({} signals)", suggestion.len());
        Ok(MutationOutcome::Applied)
    }

    /// Persist the edit overlay as a complete map.
    pub async fn save_manual(&self) -> ConsoleResult<MutationOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(PATCH_KEY) else {
            return Ok(MutationOutcome::Busy);
        };
        let weights = {
            let state = self.state.lock();
            if !state.has_pending_edit() {
                return Ok(MutationOutcome::Skipped);
            }
            state.display_weights()
        };

        let result = self.patch(&weights, "Failed to save weights.").await;
        self.reread_if_landed(&result).await;
        result?;
        log::info!("Saved manual weights ({} signals)", weights.len());
        Ok(MutationOutcome::Applied)
    }

    // ========================================================================
    // LEARNING PROPOSAL
    // ========================================================================

    pub fn present_suggested(&self, weights: WeightsMap) {
        self.state.lock().reduce(WeightsEvent::SuggestedPresented(weights));
    }

    /// Commit the learning proposal. Whatever the outcome, the proposal is
    /// closed and the weights are re-read; a failed write stays visible.
    pub async fn apply_suggested(&self) -> ConsoleResult<MutationOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(PATCH_KEY) else {
            return Ok(MutationOutcome::Busy);
        };
        let Some(weights) = self.suggested() else {
            return Ok(MutationOutcome::Skipped);
        };

        let result = self.patch(&weights, "Failed to apply suggested weights.").await;
        self.state.lock().reduce(WeightsEvent::SuggestedDismissed);
        if let Err(e) = self.refresh().await {
            log::warn!("Weights refresh after applying proposal failed: {}", e);
        }

        result?;
        log::info!("Applied learning proposal ({} signals)", weights.len());
        Ok(MutationOutcome::Applied)
    }

    /// Close the learning proposal without applying it, then re-read.
    pub async fn dismiss_suggested(&self) -> ConsoleResult<()> {
        self.state.lock().reduce(WeightsEvent::SuggestedDismissed);
        self.refresh().await
    }

    /// A 502 means the service saved the weights before a downstream step
    /// failed; adopt what it now holds.
    async fn reread_if_landed(&self, result: &ConsoleResult<()>) {
        if let Err(err) = result {
            if err.kind() == ErrorKind::UpstreamFailure {
                if let Err(e) = self.refresh().await {
                    log::warn!("Weights refresh after partial write failed: {}", e);
                }
            }
        }
    }

    async fn patch(&self, weights: &WeightsMap, failure_message: &str) -> ConsoleResult<()> {
        self.state.lock().reduce(WeightsEvent::PatchStarted);

        match self.gateway.patch_weights(weights).await {
            Ok(resource) => {
                self.state.lock().reduce(WeightsEvent::Patched(resource));
                Ok(())
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                log::warn!("Weights patch failed: {}", err);
                self.state
                    .lock()
                    .reduce(WeightsEvent::PatchFailed(RegionStatus::failed(&err, failure_message)));
                Err(err)
            }
        }
    }
}
