//! Review view state and its reducer

use std::collections::HashMap;

use serde::Serialize;

use crate::logic::decision::{DecisionRecord, DecisionStore, HistoryFilter};
use crate::logic::sequence::RequestSequence;
use crate::logic::status::RegionStatus;

/// Everything the review view renders
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewViewState {
    pub store: DecisionStore,
    pub filter: HistoryFilter,
    /// History list region
    pub history_status: RegionStatus,
    /// Inline region for the last human action
    pub action_status: RegionStatus,
    /// Review-routing explanations fetched so far, by decision id
    pub rationales: HashMap<String, String>,
    #[serde(skip)]
    pub sequence: RequestSequence,
}

#[derive(Debug, Clone)]
pub enum ReviewEvent {
    FilterChanged(HistoryFilter),
    HistoryRequested { tag: u64 },
    HistoryLoaded { tag: u64, records: Vec<DecisionRecord> },
    HistoryFailed { tag: u64, status: RegionStatus },
    ActionStarted,
    ActionSucceeded,
    ActionFailed(RegionStatus),
    RationaleLoaded { decision_id: String, text: String },
}

impl ReviewViewState {
    /// Tag a new history fetch and snapshot the filter it runs with.
    pub fn begin_fetch(&mut self) -> (u64, HistoryFilter) {
        let tag = self.sequence.issue();
        self.reduce(ReviewEvent::HistoryRequested { tag });
        (tag, self.filter.clone())
    }

    pub fn reduce(&mut self, event: ReviewEvent) {
        match event {
            ReviewEvent::FilterChanged(filter) => {
                self.filter = filter;
            }
            ReviewEvent::HistoryRequested { .. } => {
                self.history_status = RegionStatus::Loading;
            }
            ReviewEvent::HistoryLoaded { tag, records } => {
                if !self.sequence.is_latest(tag) {
                    log::debug!("Dropping stale history response #{}", tag);
                    return;
                }
                self.store.replace(records);
                self.history_status = RegionStatus::Success;
            }
            ReviewEvent::HistoryFailed { tag, status } => {
                if !self.sequence.is_latest(tag) {
                    log::debug!("Dropping stale history failure #{}", tag);
                    return;
                }
                self.history_status = status;
            }
            ReviewEvent::ActionStarted => {
                self.action_status = RegionStatus::Loading;
            }
            ReviewEvent::ActionSucceeded => {
                self.action_status = RegionStatus::Success;
            }
            ReviewEvent::ActionFailed(status) => {
                self.action_status = status;
            }
            ReviewEvent::RationaleLoaded { decision_id, text } => {
                self.rationales.insert(decision_id, text);
            }
        }
    }
}
