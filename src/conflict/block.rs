use log::debug;

use super::types::{BlockConflict, Conflict, Severity};
use super::detectable_trains;
use crate::config::DetectionSettings;
use crate::constants::{BLOCK_CRITICAL_RATIO, BLOCK_HIGH_RATIO};
use crate::models::Train;

/// Opposing trains sharing a block within the first train's clearance.
///
/// Every unordered pair is compared, so this is O(n²); active sets are tens
/// of trains, not thousands.
#[must_use]
pub fn detect_block_conflicts(trains: &[Train], settings: &DetectionSettings) -> Vec<Conflict> {
    let candidates = detectable_trains(trains);
    let mut conflicts = Vec::new();

    for (i, &(a, ta)) in candidates.iter().enumerate() {
        for &(b, tb) in candidates.iter().skip(i + 1) {
            if a.block_id != b.block_id || a.approach_dir == b.approach_dir {
                continue;
            }

            let clearance = a.block_clearance(settings.default_block_clearance_min);
            let time_diff = (ta - tb).abs();
            #[allow(clippy::cast_precision_loss)]
            let gap = time_diff as f64;
            let is_conflict = gap <= clearance;

            debug!(
                "block {}: {} at {ta} vs {} at {tb}, diff {time_diff} min, clearance {clearance} -> {}",
                a.block_id,
                a.train_id,
                b.train_id,
                if is_conflict { "conflict" } else { "clear" }
            );

            if is_conflict {
                conflicts.push(Conflict::SameBlock(BlockConflict {
                    block_id: a.block_id.clone(),
                    train_a: a.train_id.clone(),
                    train_b: b.train_id.clone(),
                    time_diff,
                    clearance,
                    severity: Severity::classify(gap, clearance, BLOCK_CRITICAL_RATIO, BLOCK_HIGH_RATIO),
                    train_a_obj: Box::new(a.clone()),
                    train_b_obj: Box::new(b.clone()),
                }));
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApproachDirection;

    fn train(id: &str, block: &str, dir: ApproachDirection, arrival: &str, delay: i64) -> Train {
        let mut train = Train::new(id, arrival, block, dir);
        train.delay = delay;
        train
    }

    fn detect(trains: &[Train]) -> Vec<Conflict> {
        detect_block_conflicts(trains, &DetectionSettings::default())
    }

    #[test]
    fn test_opposing_trains_within_clearance() {
        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 0),
            train("B", "B1", ApproachDirection::Down, "06:02", 0),
        ];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        let Conflict::SameBlock(c) = &conflicts[0] else {
            panic!("expected a block conflict");
        };
        assert_eq!(c.time_diff, 2);
        assert_eq!(c.severity, Severity::High);
        assert_eq!((c.train_a.as_str(), c.train_b.as_str()), ("A", "B"));
    }

    #[test]
    fn test_same_direction_is_not_a_block_conflict() {
        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 0),
            train("B", "B1", ApproachDirection::Up, "06:01", 0),
        ];
        assert!(detect(&trains).is_empty());
    }

    #[test]
    fn test_different_blocks_never_conflict() {
        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 0),
            train("B", "B2", ApproachDirection::Down, "06:00", 0),
        ];
        assert!(detect(&trains).is_empty());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 0),
            train("B", "B1", ApproachDirection::Down, "06:03", 0),
        ];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity(), Some(Severity::Medium));

        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 0),
            train("B", "B1", ApproachDirection::Down, "06:04", 0),
        ];
        assert!(detect(&trains).is_empty());
    }

    #[test]
    fn test_delay_brings_trains_together() {
        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 10),
            train("B", "B1", ApproachDirection::Down, "06:10", 0),
        ];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_first_train_clearance_applies() {
        let mut a = train("A", "B1", ApproachDirection::Up, "06:00", 0);
        a.clearance_min = Some(10.0);
        let b = train("B", "B1", ApproachDirection::Down, "06:08", 0);
        assert_eq!(detect(&[a.clone(), b.clone()]).len(), 1);
        // Reversed order uses B's default clearance of 3
        assert!(detect(&[b, a]).is_empty());
    }

    #[test]
    fn test_invalid_trains_are_skipped() {
        let mut broken = train("X", "B1", ApproachDirection::Down, "06:00", 0);
        broken.approach_dir = None;
        let unparseable = train("Y", "B1", ApproachDirection::Down, "six", 0);
        let trains = vec![
            train("A", "B1", ApproachDirection::Up, "06:00", 0),
            broken,
            unparseable,
            train("B", "B1", ApproachDirection::Down, "06:01", 0),
        ];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].participant_ids(), ("A", "B"));
    }

    #[test]
    fn test_reported_iff_within_clearance() {
        for offset in 0..8 {
            let arrival = crate::time::minutes_to_time(360 + offset);
            let trains = vec![
                train("A", "B1", ApproachDirection::Up, "06:00", 0),
                train("B", "B1", ApproachDirection::Down, &arrival, 0),
            ];
            assert_eq!(detect(&trains).len() == 1, offset <= 3, "offset {offset}");
        }
    }

    #[test]
    fn test_severity_monotonic_in_gap() {
        let mut previous = Severity::Critical;
        for offset in 0..=3 {
            let arrival = crate::time::minutes_to_time(360 + offset);
            let trains = vec![
                train("A", "B1", ApproachDirection::Up, "06:00", 0),
                train("B", "B1", ApproachDirection::Down, &arrival, 0),
            ];
            let severity = detect(&trains)[0].severity().expect("block conflicts carry severity");
            assert!(severity >= previous);
            previous = severity;
        }
    }
}
