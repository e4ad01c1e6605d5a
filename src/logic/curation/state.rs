//! Conflicted list state and its reducer

use serde::Serialize;

use crate::logic::gateway::ConflictedDecision;
use crate::logic::sequence::RequestSequence;
use crate::logic::status::RegionStatus;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CurationState {
    pub items: Vec<ConflictedDecision>,
    pub list_status: RegionStatus,
    /// Inline region for the learning gate
    pub approve_status: RegionStatus,
    #[serde(skip)]
    pub sequence: RequestSequence,
}

#[derive(Debug, Clone)]
pub enum CurationEvent {
    ListRequested { tag: u64 },
    ListLoaded { tag: u64, items: Vec<ConflictedDecision> },
    ListFailed { tag: u64, status: RegionStatus },
    ApproveStarted,
    Approved { human_review_id: String },
    ApproveFailed(RegionStatus),
}

impl CurationState {
    pub fn begin_fetch(&mut self) -> u64 {
        let tag = self.sequence.issue();
        self.reduce(CurationEvent::ListRequested { tag });
        tag
    }

    pub fn get(&self, human_review_id: &str) -> Option<&ConflictedDecision> {
        self.items.iter().find(|c| c.human_review_id == human_review_id)
    }

    pub fn reduce(&mut self, event: CurationEvent) {
        match event {
            CurationEvent::ListRequested { .. } => {
                self.list_status = RegionStatus::Loading;
            }
            CurationEvent::ListLoaded { tag, items } => {
                if !self.sequence.is_latest(tag) {
                    log::debug!("Dropping stale conflicted list #{}", tag);
                    return;
                }
                self.items = items;
                self.list_status = RegionStatus::Success;
            }
            CurationEvent::ListFailed { tag, status } => {
                if self.sequence.is_latest(tag) {
                    self.list_status = status;
                }
            }
            CurationEvent::ApproveStarted => {
                self.approve_status = RegionStatus::Loading;
            }
            CurationEvent::Approved { human_review_id } => {
                // One-way flip; nothing else on the entry changes
                if let Some(item) = self.items.iter_mut().find(|c| c.human_review_id == human_review_id) {
                    item.approved_for_learning = true;
                }
                self.approve_status = RegionStatus::Success;
            }
            CurationEvent::ApproveFailed(status) => {
                self.approve_status = status;
            }
        }
    }
}
