use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::ConflictType;
use crate::constants::RESOLUTION_HISTORY_CAPACITY;
use crate::resolution::{Decision, Resolution};

/// One accepted resolution, as kept in the rolling history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub conflict_type: ConflictType,
    pub priority_train: String,
    pub reduced_train: String,
    pub decision: Decision,
    pub confidence: f64,
    pub delay_reduction: i64,
    pub resolution_time_secs: f64,
}

impl ResolutionRecord {
    #[must_use]
    pub fn new(resolution: &Resolution, accepted_at: DateTime<Utc>, resolution_time_secs: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: accepted_at,
            conflict_type: resolution.conflict_type,
            priority_train: resolution.priority_train.clone(),
            reduced_train: resolution.reduced_train.clone(),
            decision: resolution.decision,
            confidence: resolution.confidence,
            delay_reduction: resolution.delay_reduction(),
            resolution_time_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TypeCounters {
    detected: usize,
    resolved: usize,
}

/// Running counters for the whole session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    same_block: TypeCounters,
    loop_line: TypeCounters,
    junction: TypeCounters,
    total_conflicts_rejected: usize,
    total_trains_cleared: usize,
    total_delay_reduced: i64,
    average_resolution_time: f64,
    resolution_history: VecDeque<ResolutionRecord>,
    #[serde(skip, default = "default_capacity")]
    history_capacity: usize,
}

const fn default_capacity() -> usize {
    RESOLUTION_HISTORY_CAPACITY
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self::with_history_capacity(RESOLUTION_HISTORY_CAPACITY)
    }
}

impl PerformanceStats {
    #[must_use]
    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            same_block: TypeCounters::default(),
            loop_line: TypeCounters::default(),
            junction: TypeCounters::default(),
            total_conflicts_rejected: 0,
            total_trains_cleared: 0,
            total_delay_reduced: 0,
            average_resolution_time: 0.0,
            resolution_history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    const fn counters(&self, conflict_type: ConflictType) -> &TypeCounters {
        match conflict_type {
            ConflictType::SameBlock => &self.same_block,
            ConflictType::LoopLine => &self.loop_line,
            ConflictType::Junction => &self.junction,
        }
    }

    fn counters_mut(&mut self, conflict_type: ConflictType) -> &mut TypeCounters {
        match conflict_type {
            ConflictType::SameBlock => &mut self.same_block,
            ConflictType::LoopLine => &mut self.loop_line,
            ConflictType::Junction => &mut self.junction,
        }
    }

    /// Detection reports the current number of conflicts, so the counter
    /// tracks the high-water mark rather than summing passes.
    pub fn record_detection(&mut self, conflict_type: ConflictType, observed: usize) {
        if observed == 0 {
            return;
        }
        let counters = self.counters_mut(conflict_type);
        counters.detected = counters.detected.max(observed);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn record_resolution(&mut self, record: ResolutionRecord) {
        let n = self.total_conflicts_resolved() as f64;
        self.average_resolution_time =
            (self.average_resolution_time * n + record.resolution_time_secs) / (n + 1.0);
        self.counters_mut(record.conflict_type).resolved += 1;
        self.total_delay_reduced += record.delay_reduction;

        self.resolution_history.push_front(record);
        self.resolution_history.truncate(self.history_capacity);
    }

    pub fn record_rejection(&mut self) {
        self.total_conflicts_rejected += 1;
    }

    pub fn record_cleared(&mut self) {
        self.total_trains_cleared += 1;
    }

    #[must_use]
    pub const fn detected(&self, conflict_type: ConflictType) -> usize {
        self.counters(conflict_type).detected
    }

    #[must_use]
    pub const fn resolved(&self, conflict_type: ConflictType) -> usize {
        self.counters(conflict_type).resolved
    }

    #[must_use]
    pub const fn total_conflicts_detected(&self) -> usize {
        self.same_block.detected + self.loop_line.detected + self.junction.detected
    }

    #[must_use]
    pub const fn total_conflicts_resolved(&self) -> usize {
        self.same_block.resolved + self.loop_line.resolved + self.junction.resolved
    }

    #[must_use]
    pub const fn total_conflicts_rejected(&self) -> usize {
        self.total_conflicts_rejected
    }

    #[must_use]
    pub const fn total_trains_cleared(&self) -> usize {
        self.total_trains_cleared
    }

    #[must_use]
    pub const fn total_delay_reduced(&self) -> i64 {
        self.total_delay_reduced
    }

    /// Seconds from request to acceptance, averaged over all resolutions
    #[must_use]
    pub const fn average_resolution_time(&self) -> f64 {
        self.average_resolution_time
    }

    /// Newest first
    pub fn resolution_history(&self) -> impl Iterator<Item = &ResolutionRecord> {
        self.resolution_history.iter()
    }

    /// Snapshot with the derived dashboard figures
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self, active_conflicts: usize, attention_needed: bool) -> PerformanceSummary {
        let detected = self.total_conflicts_detected();
        let resolved = self.total_conflicts_resolved();

        let resolution_rate = if detected == 0 {
            0.0
        } else {
            resolved as f64 / detected as f64 * 100.0
        };
        let average_delay_reduction = if resolved == 0 {
            0.0
        } else {
            self.total_delay_reduced as f64 / resolved as f64
        };

        PerformanceSummary {
            total_conflicts_detected: detected,
            total_conflicts_resolved: resolved,
            total_conflicts_rejected: self.total_conflicts_rejected,
            total_trains_cleared: self.total_trains_cleared,
            total_delay_reduced: self.total_delay_reduced,
            average_resolution_time: self.average_resolution_time,
            resolution_rate,
            average_delay_reduction,
            throughput_improvement: throughput_improvement(resolved, self.total_delay_reduced),
            active_conflicts,
            system_status: if attention_needed {
                SystemStatus::Managing
            } else {
                SystemStatus::Optimal
            },
        }
    }
}

/// `min(50, resolved*5) + min(50, floor(delayReduced/2))`, at most 100
#[must_use]
pub fn throughput_improvement(resolved: usize, delay_reduced: i64) -> u32 {
    let from_resolutions = u32::try_from(resolved.saturating_mul(5).min(50)).unwrap_or(50);
    let from_delay = u32::try_from(delay_reduced.max(0).div_euclid(2).min(50)).unwrap_or(50);
    (from_resolutions + from_delay).min(100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    /// At least one active train is flagged or delayed
    Managing,
    Optimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_conflicts_detected: usize,
    pub total_conflicts_resolved: usize,
    pub total_conflicts_rejected: usize,
    pub total_trains_cleared: usize,
    pub total_delay_reduced: i64,
    pub average_resolution_time: f64,
    /// Percentage of detected conflicts that were resolved
    pub resolution_rate: f64,
    /// Minutes per resolution
    pub average_delay_reduction: f64,
    /// 0-100 score
    pub throughput_improvement: u32,
    pub active_conflicts: usize,
    pub system_status: SystemStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(conflict_type: ConflictType, delay_reduction: i64, secs: f64) -> ResolutionRecord {
        ResolutionRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            conflict_type,
            priority_train: "A".to_string(),
            reduced_train: "B".to_string(),
            decision: Decision::ReduceSpeed,
            confidence: 80.0,
            delay_reduction,
            resolution_time_secs: secs,
        }
    }

    #[test]
    fn test_detection_tracks_high_water_mark() {
        let mut stats = PerformanceStats::default();
        stats.record_detection(ConflictType::SameBlock, 3);
        stats.record_detection(ConflictType::SameBlock, 2);
        stats.record_detection(ConflictType::SameBlock, 0);
        assert_eq!(stats.detected(ConflictType::SameBlock), 3);
        stats.record_detection(ConflictType::SameBlock, 4);
        assert_eq!(stats.detected(ConflictType::SameBlock), 4);
    }

    #[test]
    fn test_total_detected_is_sum_of_types() {
        let mut stats = PerformanceStats::default();
        stats.record_detection(ConflictType::SameBlock, 2);
        stats.record_detection(ConflictType::LoopLine, 1);
        stats.record_detection(ConflictType::Junction, 5);
        assert_eq!(stats.total_conflicts_detected(), 8);
    }

    #[test]
    fn test_running_average_resolution_time() {
        let mut stats = PerformanceStats::default();
        stats.record_resolution(record(ConflictType::SameBlock, 3, 2.0));
        stats.record_resolution(record(ConflictType::LoopLine, 2, 4.0));
        stats.record_resolution(record(ConflictType::Junction, 0, 6.0));
        assert_eq!(stats.average_resolution_time(), 4.0);
        assert_eq!(stats.total_conflicts_resolved(), 3);
        assert_eq!(stats.total_delay_reduced(), 5);
    }

    #[test]
    fn test_history_is_newest_first_and_bounded() {
        let mut stats = PerformanceStats::with_history_capacity(3);
        for secs in 0..5 {
            stats.record_resolution(record(ConflictType::SameBlock, 1, f64::from(secs)));
        }
        let times: Vec<f64> = stats
            .resolution_history()
            .map(|r| r.resolution_time_secs)
            .collect();
        assert_eq!(times, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_default_history_capacity() {
        let mut stats = PerformanceStats::default();
        for _ in 0..60 {
            stats.record_resolution(record(ConflictType::SameBlock, 0, 1.0));
        }
        assert_eq!(stats.resolution_history().count(), 50);
        assert_eq!(stats.resolved(ConflictType::SameBlock), 60);
    }

    #[test]
    fn test_throughput_improvement() {
        assert_eq!(throughput_improvement(0, 0), 0);
        assert_eq!(throughput_improvement(2, 7), 13);
        assert_eq!(throughput_improvement(20, 40), 70);
        assert_eq!(throughput_improvement(20, 500), 100);
    }

    #[test]
    fn test_summary_derived_metrics() {
        let mut stats = PerformanceStats::default();
        stats.record_detection(ConflictType::SameBlock, 4);
        stats.record_resolution(record(ConflictType::SameBlock, 3, 1.0));
        stats.record_resolution(record(ConflictType::SameBlock, 1, 1.0));
        stats.record_rejection();

        let summary = stats.summary(2, true);
        assert_eq!(summary.resolution_rate, 50.0);
        assert_eq!(summary.average_delay_reduction, 2.0);
        assert_eq!(summary.total_conflicts_rejected, 1);
        assert_eq!(summary.throughput_improvement, 12);
        assert_eq!(summary.system_status, SystemStatus::Managing);

        assert_eq!(PerformanceStats::default().summary(0, false).system_status, SystemStatus::Optimal);
    }
}
