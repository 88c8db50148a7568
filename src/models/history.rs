use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Train, TrainStatus};

/// Snapshot of a train taken when it left the active set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub train: Train,
    pub cleared_at: DateTime<Utc>,
    /// Whether the train had an accepted resolution when it was cleared
    pub was_resolved: bool,
}

impl HistoryEntry {
    #[must_use]
    pub fn from_cleared(mut train: Train, cleared_at: DateTime<Utc>) -> Self {
        let was_resolved = train.status == TrainStatus::Resolved;
        train.status = TrainStatus::Cleared;
        Self {
            train,
            cleared_at,
            was_resolved,
        }
    }
}

/// Receives cleared trains. Ownership of the record moves here; the active
/// set never deletes a train outright.
pub trait TrainHistory {
    fn record(&mut self, entry: HistoryEntry);

    /// Entries newest first
    fn entries(&self) -> Vec<&HistoryEntry>;
}

/// Process-lifetime history kept newest first
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: VecDeque<HistoryEntry>,
}

impl InMemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TrainHistory for InMemoryHistory {
    fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
    }

    fn entries(&self) -> Vec<&HistoryEntry> {
        self.entries.iter().collect()
    }
}
