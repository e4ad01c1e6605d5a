//! Weights view state and the clamping rules for operator input

use serde::Serialize;

use crate::constants::{WEIGHT_MAX, WEIGHT_MIN};
use crate::logic::gateway::{WeightsMap, WeightsResource};
use crate::logic::sequence::RequestSequence;
use crate::logic::status::RegionStatus;

/// Clamp into the weight range; NaN becomes the minimum.
pub fn clamp_weight(value: f64) -> f64 {
    if value.is_nan() {
        return WEIGHT_MIN;
    }
    value.clamp(WEIGHT_MIN, WEIGHT_MAX)
}

/// Operator input to a weight. Out-of-range numbers, overflow included, are
/// clamped; text that is not a number is 0.
pub fn parse_weight(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) => clamp_weight(value),
        Err(_) => WEIGHT_MIN,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WeightsState {
    /// Last resource read from or written to the service
    pub resource: Option<WeightsResource>,
    /// Operator edits not yet saved, already clamped
    pub overlay: WeightsMap,
    pub load_status: RegionStatus,
    /// Save / apply region
    pub patch_status: RegionStatus,
    /// Proposal returned by a learning approval, awaiting apply or dismiss
    pub suggested: Option<WeightsMap>,
    #[serde(skip)]
    pub sequence: RequestSequence,
}

#[derive(Debug, Clone)]
pub enum WeightsEvent {
    LoadRequested { tag: u64 },
    Loaded { tag: u64, resource: WeightsResource },
    LoadFailed { tag: u64, status: RegionStatus },
    Edited { signal: String, value: f64 },
    SuggestionDismissed,
    PatchStarted,
    Patched(WeightsResource),
    PatchFailed(RegionStatus),
    SuggestedPresented(WeightsMap),
    SuggestedDismissed,
}

impl WeightsState {
    pub fn begin_fetch(&mut self) -> u64 {
        let tag = self.sequence.issue();
        self.reduce(WeightsEvent::LoadRequested { tag });
        tag
    }

    pub fn committed(&self) -> Option<&WeightsMap> {
        self.resource.as_ref().map(|r| &r.weights)
    }

    pub fn pending_suggestion(&self) -> Option<&WeightsMap> {
        self.resource
            .as_ref()
            .and_then(|r| r.pending_suggestion.as_ref())
            .filter(|s| !s.is_empty())
    }

    /// Committed signal names, or the suggestion's when nothing is committed.
    pub fn signal_names(&self) -> Vec<String> {
        match self.committed() {
            Some(weights) if !weights.is_empty() => weights.keys().cloned().collect(),
            _ => self
                .pending_suggestion()
                .map(|s| s.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }

    fn committed_value(&self, signal: &str) -> f64 {
        self.committed()
            .and_then(|w| w.get(signal))
            .copied()
            .unwrap_or(WEIGHT_MIN)
    }

    /// Edit, else committed value, else 0, for every shown signal.
    pub fn display_weights(&self) -> WeightsMap {
        self.signal_names()
            .into_iter()
            .map(|name| {
                let value = self
                    .overlay
                    .get(&name)
                    .copied()
                    .unwrap_or_else(|| self.committed_value(&name));
                (name, value)
            })
            .collect()
    }

    pub fn has_pending_edit(&self) -> bool {
        self.signal_names().iter().any(|name| {
            self.overlay
                .get(name)
                .map_or(false, |edit| *edit != self.committed_value(name))
        })
    }

    pub fn reduce(&mut self, event: WeightsEvent) {
        match event {
            WeightsEvent::LoadRequested { .. } => {
                self.load_status = RegionStatus::Loading;
            }
            WeightsEvent::Loaded { tag, resource } => {
                if !self.sequence.is_latest(tag) {
                    log::debug!("Dropping stale weights response #{}", tag);
                    return;
                }
                self.resource = Some(resource);
                self.overlay.clear();
                self.load_status = RegionStatus::Success;
            }
            WeightsEvent::LoadFailed { tag, status } => {
                if self.sequence.is_latest(tag) {
                    self.load_status = status;
                }
            }
            WeightsEvent::Edited { signal, value } => {
                self.overlay.insert(signal, clamp_weight(value));
            }
            WeightsEvent::SuggestionDismissed => {
                if let Some(resource) = self.resource.as_mut() {
                    resource.pending_suggestion = None;
                }
            }
            WeightsEvent::PatchStarted => {
                self.patch_status = RegionStatus::Loading;
            }
            WeightsEvent::Patched(resource) => {
                // Anything read before this write is now stale
                self.sequence.issue();
                self.resource = Some(resource);
                self.overlay.clear();
                self.patch_status = RegionStatus::Success;
                if self.load_status.is_loading() {
                    self.load_status = RegionStatus::Success;
                }
            }
            WeightsEvent::PatchFailed(status) => {
                self.patch_status = status;
            }
            WeightsEvent::SuggestedPresented(weights) => {
                self.suggested = Some(weights);
            }
            WeightsEvent::SuggestedDismissed => {
                self.suggested = None;
            }
        }
    }
}
