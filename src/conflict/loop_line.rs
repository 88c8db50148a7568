use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;

use super::types::{Conflict, LoopLineConflict};
use super::detectable_trains;
use crate::config::DetectionSettings;
use crate::models::{ApproachDirection, Train};

/// Same-direction trains in one block whose follower arrives too soon after
/// its leader, so the follower has to be held in the loop line.
///
/// Trains resolved within the grace window are left out so a pair that was
/// just resolved is not flagged again straight away. Within each
/// block/direction lane only neighbours in arrival order are compared.
#[must_use]
pub fn detect_loop_line_conflicts(
    trains: &[Train],
    now: DateTime<Utc>,
    settings: &DetectionSettings,
) -> Vec<Conflict> {
    let eligible: Vec<Train> = trains
        .iter()
        .filter(|t| !t.is_recently_resolved(now, settings.resolved_grace_secs))
        .cloned()
        .collect();

    let mut lanes: IndexMap<(&str, ApproachDirection), Vec<(&Train, i64)>> = IndexMap::new();
    for (train, arrival) in detectable_trains(&eligible) {
        let Some(dir) = train.approach_dir else {
            continue;
        };
        lanes
            .entry((train.block_id.as_str(), dir))
            .or_default()
            .push((train, arrival));
    }

    let mut conflicts = Vec::new();
    for ((block_id, dir), mut lane) in lanes {
        lane.sort_by(|(a, ta), (b, tb)| ta.cmp(tb).then_with(|| a.train_id.cmp(&b.train_id)));

        for pair in lane.windows(2) {
            let [(lead, t_lead), (follow, t_follow)] = pair else {
                continue;
            };
            let gap = t_follow - t_lead;
            if !(0..settings.loop_follow_gap_min).contains(&gap) {
                continue;
            }

            debug!(
                "loop line {block_id} {dir}: {} follows {} by {gap} min",
                follow.train_id, lead.train_id
            );

            conflicts.push(Conflict::LoopLine(LoopLineConflict {
                block_id: block_id.to_string(),
                leading_train: lead.train_id.clone(),
                following_train: follow.train_id.clone(),
                time_diff: gap,
                leading_train_obj: Box::new(Train::clone(lead)),
                following_train_obj: Box::new(Train::clone(follow)),
            }));
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainStatus;
    use chrono::Duration;

    fn train(id: &str, block: &str, arrival: &str, delay: i64) -> Train {
        let mut train = Train::new(id, arrival, block, ApproachDirection::Up);
        train.delay = delay;
        train
    }

    fn detect(trains: &[Train]) -> Vec<Conflict> {
        detect_loop_line_conflicts(trains, Utc::now(), &DetectionSettings::default())
    }

    #[test]
    fn test_delayed_leader_blocks_follower() {
        let trains = vec![train("LEAD", "B2", "06:00", 10), train("FOLLOW", "B2", "06:12", 0)];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        let Conflict::LoopLine(c) = &conflicts[0] else {
            panic!("expected a loop-line conflict");
        };
        assert_eq!(c.leading_train, "LEAD");
        assert_eq!(c.following_train, "FOLLOW");
        assert_eq!(c.time_diff, 2);
        assert_eq!(conflicts[0].severity(), None);
    }

    #[test]
    fn test_gap_threshold_is_exclusive() {
        let trains = vec![train("A", "B2", "06:00", 0), train("B", "B2", "06:05", 0)];
        assert!(detect(&trains).is_empty());
        let trains = vec![train("A", "B2", "06:00", 0), train("B", "B2", "06:04", 0)];
        assert_eq!(detect(&trains).len(), 1);
    }

    #[test]
    fn test_simultaneous_arrivals_conflict() {
        let trains = vec![train("B", "B2", "06:00", 0), train("A", "B2", "06:00", 0)];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].participant_ids(), ("A", "B"));
    }

    #[test]
    fn test_only_adjacent_pairs_are_reported() {
        let trains = vec![
            train("A", "B2", "06:00", 0),
            train("C", "B2", "06:04", 0),
            train("B", "B2", "06:02", 0),
        ];
        let conflicts = detect(&trains);
        let pairs: Vec<_> = conflicts.iter().map(Conflict::participant_ids).collect();
        assert_eq!(pairs, vec![("A", "B"), ("B", "C")]);
    }

    #[test]
    fn test_opposite_direction_ignored() {
        let mut down = train("B", "B2", "06:01", 0);
        down.approach_dir = Some(ApproachDirection::Down);
        let trains = vec![train("A", "B2", "06:00", 0), down];
        assert!(detect(&trains).is_empty());
    }

    #[test]
    fn test_recently_resolved_trains_are_excluded() {
        let now = Utc::now();
        let mut resolved = train("A", "B2", "06:00", 0);
        resolved.status = TrainStatus::Resolved;
        resolved.resolved_at = Some(now - Duration::seconds(60));
        let trains = vec![resolved.clone(), train("B", "B2", "06:02", 0)];
        assert!(detect_loop_line_conflicts(&trains, now, &DetectionSettings::default()).is_empty());

        resolved.resolved_at = Some(now - Duration::minutes(6));
        let trains = vec![resolved, train("B", "B2", "06:02", 0)];
        assert_eq!(detect_loop_line_conflicts(&trains, now, &DetectionSettings::default()).len(), 1);
    }

    #[test]
    fn test_lanes_are_independent() {
        let trains = vec![
            train("A", "B2", "06:00", 0),
            train("X", "B9", "06:01", 0),
            train("B", "B2", "06:03", 0),
        ];
        let conflicts = detect(&trains);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].participant_ids(), ("A", "B"));
    }
}
