//! Read-through cache of the last history fetch

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::DecisionRecord;

/// Shown when a history load succeeds with no rows
pub const EMPTY_HISTORY_MESSAGE: &str = "No history yet. Run a few decisions or seed demo data.";

/// Read-through cache of the decision history, replaced wholesale on every load
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionStore {
    records: Vec<DecisionRecord>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl DecisionStore {
    pub fn replace(&mut self, records: Vec<DecisionRecord>) {
        self.records = records;
        self.last_refreshed = Some(Utc::now());
    }

    pub fn get(&self, id: &str) -> Option<&DecisionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }
}
