mod block;
mod junction;
mod loop_line;
mod types;

pub use block::detect_block_conflicts;
pub use junction::detect_junction_conflicts;
pub use loop_line::detect_loop_line_conflicts;
pub use types::{
    BlockConflict, Conflict, ConflictKey, ConflictType, JunctionConflict, LoopLineConflict, Severity,
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::config::DetectionSettings;
use crate::models::Train;

/// Conflicts found by one pass of all three detectors
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionReport {
    pub same_block: Vec<Conflict>,
    pub loop_line: Vec<Conflict>,
    pub junction: Vec<Conflict>,
}

impl DetectionReport {
    #[must_use]
    pub fn of_type(&self, conflict_type: ConflictType) -> &[Conflict] {
        match conflict_type {
            ConflictType::SameBlock => &self.same_block,
            ConflictType::LoopLine => &self.loop_line,
            ConflictType::Junction => &self.junction,
        }
    }

    #[must_use]
    pub fn count(&self, conflict_type: ConflictType) -> usize {
        self.of_type(conflict_type).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.same_block
            .iter()
            .chain(&self.loop_line)
            .chain(&self.junction)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.same_block.len() + self.loop_line.len() + self.junction.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look a conflict up by the key it had in this pass
    #[must_use]
    pub fn find(&self, key: &ConflictKey) -> Option<&Conflict> {
        self.of_type(key.conflict_type).iter().find(|c| &c.key() == key)
    }
}

/// Run every detector over the active trains.
///
/// Pure and deterministic for a given `now`: the trains are only read, so
/// this can be re-run after every change to the train set.
#[must_use]
pub fn detect_all(trains: &[Train], now: DateTime<Utc>, settings: &DetectionSettings) -> DetectionReport {
    let start = std::time::Instant::now();

    let report = DetectionReport {
        same_block: detect_block_conflicts(trains, settings),
        loop_line: detect_loop_line_conflicts(trains, now, settings),
        junction: detect_junction_conflicts(trains, settings),
    };

    debug!(
        "Detection over {} trains took {:?}: {} block, {} loop, {} junction",
        trains.len(),
        start.elapsed(),
        report.same_block.len(),
        report.loop_line.len(),
        report.junction.len()
    );

    report
}

/// Trains the block and loop-line detectors can reason about, paired with
/// their effective arrival. Bad records are logged and dropped.
fn detectable_trains(trains: &[Train]) -> Vec<(&Train, i64)> {
    trains
        .iter()
        .filter_map(|train| {
            if let Some(field) = train.missing_detection_field() {
                let id: &str = if train.train_id.is_empty() { "UNKNOWN" } else { &train.train_id };
                warn!("Train {id} missing required field: {field}");
                return None;
            }
            train.effective_arrival().map(|arrival| (train, arrival))
        })
        .collect()
}
