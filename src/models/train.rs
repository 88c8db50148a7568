use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::conflict::ConflictKey;
use crate::constants::FALLBACK_JUNCTION_SPEED_KMH;
use crate::resolution::Decision;
use crate::time::effective_arrival;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApproachDirection {
    Up,
    Down,
}

impl ApproachDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl FromStr for ApproachDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(format!("Unknown approach direction: {other}")),
        }
    }
}

impl fmt::Display for ApproachDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime status of a train.
///
/// `OnTime → Delayed → InConflict → {Resolved | ManualReview} → Cleared`.
/// `Cleared` is terminal and only reachable through the clear operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainStatus {
    #[default]
    OnTime,
    Delayed,
    InConflict,
    Resolved,
    ManualReview,
    Cleared,
}

impl TrainStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "ON_TIME",
            Self::Delayed => "DELAYED",
            Self::InConflict => "IN_CONFLICT",
            Self::Resolved => "RESOLVED",
            Self::ManualReview => "MANUAL_REVIEW",
            Self::Cleared => "CLEARED",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cleared)
    }

    /// Whether the state machine permits moving from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use TrainStatus::{Cleared, Delayed, InConflict, ManualReview, OnTime, Resolved};
        match (self, next) {
            (Cleared, _) => false,
            (_, Cleared) => true,
            (OnTime | Delayed | Resolved, OnTime | Delayed) => true,
            (OnTime | Delayed | ManualReview, InConflict) => true,
            // Resolution and release need a conflict in hand
            (InConflict | ManualReview, Resolved | OnTime) => true,
            (InConflict, ManualReview) => true,
            _ => false,
        }
    }

    /// In conflict or waiting on a dispatcher
    #[must_use]
    pub const fn is_handling_conflict(self) -> bool {
        matches!(self, Self::InConflict | Self::ManualReview)
    }
}

impl fmt::Display for TrainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub train_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_name: Option<String>,

    pub arrival_time: String,
    #[serde(default)]
    pub departure_time: String,
    #[serde(default)]
    pub delay: i64,

    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub approach_dir: Option<ApproachDirection>,
    #[serde(default)]
    pub next_junction: Option<String>,
    #[serde(default)]
    pub next_block: Option<String>,
    #[serde(default)]
    pub distance_to_junction: f64,
    #[serde(default)]
    pub current_block: Option<String>,

    // Capability data, only read when building a decision request.
    // Priority is an opaque ordinal handed to the decision service.
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub passengers: Option<u32>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub travel_time_hr: Option<f64>,
    #[serde(default)]
    pub train_capacity: Option<u32>,
    #[serde(default, with = "peak_flag_serde")]
    pub is_peak_hour: bool,
    #[serde(default)]
    pub max_speed: f64,
    #[serde(default)]
    pub clearance_min: Option<f64>,
    #[serde(default)]
    pub junction_clearance_min: Option<f64>,

    #[serde(default)]
    pub status: TrainStatus,
    #[serde(default)]
    pub conflict: bool,
    #[serde(default)]
    pub conflict_reason: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_applied: Option<Decision>,
    /// Conflict whose recommendation was rejected and is awaiting manual review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_of: Option<ConflictKey>,
}

impl Train {
    /// Create a train with the runtime fields in their ingestion state
    #[must_use]
    pub fn new(
        train_id: impl Into<String>,
        arrival_time: impl Into<String>,
        block_id: impl Into<String>,
        approach_dir: ApproachDirection,
    ) -> Self {
        let arrival_time = arrival_time.into();
        let block_id = block_id.into();
        Self {
            train_id: train_id.into(),
            train_name: None,
            departure_time: arrival_time.clone(),
            arrival_time,
            delay: 0,
            current_block: Some(block_id.clone()),
            block_id,
            approach_dir: Some(approach_dir),
            next_junction: None,
            next_block: None,
            distance_to_junction: 0.0,
            priority: None,
            passengers: None,
            distance_km: None,
            travel_time_hr: None,
            train_capacity: None,
            is_peak_hour: false,
            max_speed: 80.0,
            clearance_min: None,
            junction_clearance_min: None,
            status: TrainStatus::OnTime,
            conflict: false,
            conflict_reason: None,
            resolved_at: None,
            resolution_applied: None,
            review_of: None,
        }
    }

    /// Reset runtime state to what ingestion hands over
    pub fn reset_runtime(&mut self) {
        self.delay = 0;
        self.status = TrainStatus::OnTime;
        self.conflict = false;
        self.conflict_reason = None;
        self.resolved_at = None;
        self.resolution_applied = None;
        self.review_of = None;
    }

    /// Scheduled arrival plus delay in minutes since midnight, `None` if the
    /// schedule string is unusable
    #[must_use]
    pub fn effective_arrival(&self) -> Option<i64> {
        effective_arrival(&self.arrival_time, self.delay).ok()
    }

    /// Name of the first field the detectors need but this train lacks
    #[must_use]
    pub fn missing_detection_field(&self) -> Option<&'static str> {
        if self.train_id.trim().is_empty() {
            Some("train_id")
        } else if self.effective_arrival().is_none() {
            Some("arrival_time")
        } else if self.block_id.trim().is_empty() {
            Some("block_id")
        } else if self.approach_dir.is_none() {
            Some("approach_dir")
        } else {
            None
        }
    }

    #[must_use]
    pub fn block_clearance(&self, default: f64) -> f64 {
        positive_or(self.clearance_min, default)
    }

    #[must_use]
    pub fn junction_clearance(&self, default: f64) -> f64 {
        positive_or(self.junction_clearance_min, default)
    }

    /// Junction this train converges on, falling back to its next block
    #[must_use]
    pub fn junction_id(&self) -> Option<&str> {
        [self.next_junction.as_deref(), self.next_block.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty() && *id != "null")
    }

    /// Projected arrival at the next junction in minutes since midnight
    #[must_use]
    pub fn projected_junction_arrival(&self) -> Option<f64> {
        let base = self.effective_arrival()?;
        let speed = if self.max_speed > 0.0 {
            self.max_speed
        } else {
            FALLBACK_JUNCTION_SPEED_KMH
        };
        let travel = if self.distance_to_junction > 0.0 {
            self.distance_to_junction / speed * 60.0
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss)]
        let base = base as f64;
        Some(base + travel)
    }

    /// True for a train resolved less than `grace_secs` before `now`
    #[must_use]
    pub fn is_recently_resolved(&self, now: DateTime<Utc>, grace_secs: i64) -> bool {
        self.status == TrainStatus::Resolved
            && self
                .resolved_at
                .is_some_and(|at| (now - at).num_seconds() < grace_secs)
    }

    /// Whether this train counts towards the active-conflict figure
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.conflict || matches!(self.status, TrainStatus::InConflict | TrainStatus::Delayed)
    }
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| *v > 0.0).unwrap_or(default)
}

/// The wire format carries the peak-hour flag as 0/1
mod peak_flag_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Bool(bool),
            Number(f64),
        }

        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => b,
            Flag::Number(n) => n != 0.0,
        })
    }
}
