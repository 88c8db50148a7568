use indexmap::IndexMap;
use log::debug;

use super::types::{Conflict, JunctionConflict, Severity};
use crate::config::DetectionSettings;
use crate::constants::{JUNCTION_CRITICAL_RATIO, JUNCTION_HIGH_RATIO};
use crate::models::Train;

const UNKNOWN_ROUTE: &str = "Unknown";

/// Trains converging on one junction, compared in projected arrival order.
///
/// A train's junction is its `next_junction`, falling back to `next_block`.
/// Only neighbours in arrival order are checked against the earlier train's
/// junction clearance.
#[must_use]
pub fn detect_junction_conflicts(trains: &[Train], settings: &DetectionSettings) -> Vec<Conflict> {
    let mut junctions: IndexMap<&str, Vec<(&Train, f64)>> = IndexMap::new();
    for train in trains {
        let Some(junction_id) = train.junction_id() else {
            continue;
        };
        if train.train_id.trim().is_empty() {
            log::warn!("Skipping train without id approaching junction {junction_id}");
            continue;
        }
        let Some(arrival) = train.projected_junction_arrival() else {
            log::warn!(
                "Train {} has unusable arrival_time {:?}, skipping junction {junction_id}",
                train.train_id,
                train.arrival_time
            );
            continue;
        };
        junctions.entry(junction_id).or_default().push((train, arrival));
    }

    let mut conflicts = Vec::new();
    for (junction_id, mut approaching) in junctions {
        if approaching.len() < 2 {
            continue;
        }

        approaching.sort_by(|(a, ta), (b, tb)| {
            ta.total_cmp(tb).then_with(|| a.train_id.cmp(&b.train_id))
        });

        for pair in approaching.windows(2) {
            let [(first, t1), (second, t2)] = pair else {
                continue;
            };
            let gap = t2 - t1;
            let clearance = first.junction_clearance(settings.default_junction_clearance_min);

            debug!(
                "junction {junction_id}: {} at {t1:.2} then {} at {t2:.2}, gap {gap:.2} min, needs {clearance}",
                first.train_id, second.train_id
            );

            if gap > clearance {
                continue;
            }

            conflicts.push(Conflict::Junction(JunctionConflict {
                junction_id: junction_id.to_string(),
                train1: first.train_id.clone(),
                train2: second.train_id.clone(),
                time_gap: (gap * 10.0).round() / 10.0,
                clearance_needed: clearance,
                severity: Severity::classify(gap, clearance, JUNCTION_CRITICAL_RATIO, JUNCTION_HIGH_RATIO),
                route1: route_of(first),
                route2: route_of(second),
                train1_obj: Box::new(Train::clone(first)),
                train2_obj: Box::new(Train::clone(second)),
            }));
        }
    }

    conflicts
}

fn route_of(train: &Train) -> String {
    train
        .current_block
        .clone()
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| UNKNOWN_ROUTE.to_string())
}
