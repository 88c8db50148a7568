//! Built-in rule-based recommender answering `/ai-suggest`.

use rail_control::resolution::{DecisionRequest, DecisionResponse};
use rail_control::Decision;

const LINE_SPEED_KMH: f64 = 100.0;
const REDUCED_SPEED_FACTOR: f64 = 0.6;
const PEAK_HOLD_MINUTES: i64 = 2;
const BASE_CONFIDENCE: f64 = 60.0;
const CONFIDENCE_PER_LEVEL: f64 = 10.0;
const MAX_CONFIDENCE: f64 = 95.0;

/// Pick which train keeps its path and what to do with the other one.
///
/// The higher priority level wins, ties go to the busier train. A train that
/// is already late at peak hour is held briefly rather than slowed.
pub fn recommend(request: &DecisionRequest) -> DecisionResponse {
    let swap = request.affected_train_level > request.priority_train_level
        || (request.affected_train_level == request.priority_train_level
            && request.affected_train_passengers > request.priority_train_passengers);

    let (priority, reduced, gap) = if swap {
        (
            &request.affected_train,
            &request.priority_train,
            request.affected_train_level - request.priority_train_level,
        )
    } else {
        (
            &request.priority_train,
            &request.affected_train,
            request.priority_train_level - request.affected_train_level,
        )
    };

    #[allow(clippy::cast_precision_loss)]
    let confidence = (BASE_CONFIDENCE + gap as f64 * CONFIDENCE_PER_LEVEL).min(MAX_CONFIDENCE);

    let (decision, suggested_speed, suggested_delay, reason) =
        if request.delay > 0 && request.is_peak_hour != 0 {
            (
                Decision::HoldTrain,
                None,
                Some(PEAK_HOLD_MINUTES),
                format!("Hold {reduced} for {PEAK_HOLD_MINUTES} min to clear peak-hour path for {priority}"),
            )
        } else {
            (
                Decision::ReduceSpeed,
                Some(LINE_SPEED_KMH * REDUCED_SPEED_FACTOR),
                None,
                format!("Reduce speed of {reduced} to let {priority} through"),
            )
        };

    DecisionResponse {
        success: true,
        priority_train: Some(priority.clone()),
        reduced_train: Some(reduced.clone()),
        decision: Some(decision),
        confidence: Some(confidence),
        suggested_speed,
        suggested_delay,
        reason: Some(reason),
        error: None,
    }
}
