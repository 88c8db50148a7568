//! Turning a detected conflict into a recommended resolution.
//!
//! The adapter canonicalizes a conflict into a (priority, affected) pair,
//! asks a `DecisionService` what to do and normalizes the answer. Service
//! failures never escape as errors: they come back as a fallback
//! `Resolution` that asks for manual intervention.

mod decision;
mod desk;
mod pending;

pub use decision::{
    validate_payload, DecisionRequest, DecisionResponse, DecisionService, HttpDecisionService,
    REQUIRED_FIELDS,
};
pub use desk::ResolutionDesk;
pub use pending::{PendingGuard, PendingResolutions};

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ConflictKey, ConflictType};
use crate::constants::{
    BASELINE_SPEED_KMH, DEFAULT_CONFIDENCE, DEFAULT_SUGGESTED_SPEED_KMH,
};
use crate::error::DecisionError;
use crate::models::Train;

const DEFAULT_REASON: &str = "Automated conflict resolution";

/// Action recommended for the affected train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    ReduceSpeed,
    RouteToLoop,
    HoldTrain,
    SequenceAtJunction,
    ManualIntervention,
}

impl Decision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReduceSpeed => "REDUCE_SPEED",
            Self::RouteToLoop => "ROUTE_TO_LOOP",
            Self::HoldTrain => "HOLD_TRAIN",
            Self::SequenceAtJunction => "SEQUENCE_AT_JUNCTION",
            Self::ManualIntervention => "MANUAL_INTERVENTION",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recommendation for one conflict, ready to be accepted or rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub priority_train: String,
    pub reduced_train: String,
    pub decision: Decision,
    /// 0-100
    pub confidence: f64,
    pub suggested_speed: Option<f64>,
    pub suggested_delay: Option<i64>,
    pub reason: String,
    pub conflict_type: ConflictType,
    pub conflict_key: ConflictKey,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Resolution {
    /// Fallbacks carry the failure that produced them and can only be rejected
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.decision == Decision::ManualIntervention || self.error.is_some()
    }

    /// Minutes of delay recovered by running at the suggested speed
    #[must_use]
    pub fn delay_reduction(&self) -> i64 {
        delay_reduction(self.suggested_speed)
    }
}

/// `floor((80 - speed) / 10)` for speeds strictly between 0 and 80, else 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn delay_reduction(suggested_speed: Option<f64>) -> i64 {
    match suggested_speed {
        Some(speed) if speed > 0.0 && speed < BASELINE_SPEED_KMH => {
            ((BASELINE_SPEED_KMH - speed) / 10.0).floor() as i64
        }
        _ => 0,
    }
}

/// Conflict participants in the order the decision service expects:
/// the candidate for priority first, then the train to be slowed or held.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPair {
    pub priority: Train,
    pub affected: Train,
    pub conflict_type: ConflictType,
    pub conflict_key: ConflictKey,
}

impl CanonicalPair {
    /// Pair up the snapshots a conflict carries
    #[must_use]
    pub fn from_conflict(conflict: &Conflict) -> Self {
        let (priority, affected) = conflict.snapshots();
        Self {
            priority: priority.clone(),
            affected: affected.clone(),
            conflict_type: conflict.conflict_type(),
            conflict_key: conflict.key(),
        }
    }

    #[must_use]
    pub fn request(&self) -> DecisionRequest {
        DecisionRequest::for_pair(&self.priority, &self.affected)
    }

    /// Fill in whatever the service left out.
    ///
    /// # Errors
    ///
    /// Returns `DecisionError::Unsuccessful` if the service reported failure.
    pub fn normalize(
        &self,
        response: DecisionResponse,
        requested_at: DateTime<Utc>,
    ) -> Result<Resolution, DecisionError> {
        if !response.success {
            return Err(DecisionError::Unsuccessful(
                response
                    .error
                    .unwrap_or_else(|| "Decision service reported failure".to_string()),
            ));
        }

        let suggested_speed = response
            .suggested_speed
            .filter(|&s| s > 0.0)
            .unwrap_or(DEFAULT_SUGGESTED_SPEED_KMH);

        Ok(Resolution {
            priority_train: response
                .priority_train
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| self.priority.train_id.clone()),
            reduced_train: response
                .reduced_train
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| self.affected.train_id.clone()),
            decision: response.decision.unwrap_or(Decision::ReduceSpeed),
            confidence: response.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            suggested_speed: Some(suggested_speed),
            suggested_delay: response.suggested_delay,
            reason: response
                .reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REASON.to_string()),
            conflict_type: self.conflict_type,
            conflict_key: self.conflict_key.clone(),
            requested_at,
            error: None,
        })
    }

    /// Non-fatal stand-in used whenever the service cannot answer
    #[must_use]
    pub fn fallback(&self, err: &DecisionError, requested_at: DateTime<Utc>) -> Resolution {
        let message = err.to_string();
        Resolution {
            priority_train: self.priority.train_id.clone(),
            reduced_train: self.affected.train_id.clone(),
            decision: Decision::ManualIntervention,
            confidence: 0.0,
            suggested_speed: Some(DEFAULT_SUGGESTED_SPEED_KMH),
            suggested_delay: None,
            reason: format!("Decision service unavailable: {message}"),
            conflict_type: self.conflict_type,
            conflict_key: self.conflict_key.clone(),
            requested_at,
            error: Some(message),
        }
    }
}

/// Ask `service` about `pair`, bounded by `timeout`.
///
/// Always yields a `Resolution`; any failure becomes a fallback.
pub async fn resolve_pair<S: DecisionService>(
    service: &S,
    pair: &CanonicalPair,
    timeout: Duration,
) -> Resolution {
    let requested_at = Utc::now();
    let request = pair.request();

    let outcome = match tokio::time::timeout(timeout, service.suggest(&request)).await {
        Ok(Ok(response)) => pair.normalize(response, requested_at),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DecisionError::Timeout(timeout)),
    };

    match outcome {
        Ok(resolution) => {
            info!(
                "{}: {} for train {} ({}% confidence)",
                pair.conflict_key, resolution.decision, resolution.reduced_train, resolution.confidence
            );
            resolution
        }
        Err(err) => {
            warn!("{}: falling back to manual intervention: {err}", pair.conflict_key);
            pair.fallback(&err, requested_at)
        }
    }
}
