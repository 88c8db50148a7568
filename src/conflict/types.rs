//! Core types for conflict detection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ResolutionError;
use crate::models::Train;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    SameBlock, // Opposing trains in one block
    LoopLine,  // Follower too close behind a leader, same block and direction
    Junction,  // Trains converging on one junction
}

impl ConflictType {
    pub const ALL: [Self; 3] = [Self::SameBlock, Self::LoopLine, Self::Junction];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameBlock => "SAME_BLOCK",
            Self::LoopLine => "LOOP_LINE",
            Self::Junction => "JUNCTION",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How close a conflict is to actually happening. Ordered from the smallest
/// gap to the largest, so `Critical < High < Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    /// Classify a gap against the clearance it should have had
    #[must_use]
    pub fn classify(gap: f64, clearance: f64, critical_ratio: f64, high_ratio: f64) -> Self {
        let ratio = gap / clearance;
        if ratio < critical_ratio {
            Self::Critical
        } else if ratio < high_ratio {
            Self::High
        } else {
            Self::Medium
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a conflict within one detection pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictKey {
    pub conflict_type: ConflictType,
    pub resource_id: String,
    pub participants: [String; 2],
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}|{}",
            self.conflict_type, self.resource_id, self.participants[0], self.participants[1]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConflict {
    pub block_id: String,
    #[serde(rename = "trainA")]
    pub train_a: String,
    #[serde(rename = "trainB")]
    pub train_b: String,
    #[serde(rename = "timeDiff")]
    pub time_diff: i64,
    pub clearance: f64,
    pub severity: Severity,
    #[serde(rename = "trainAObj")]
    pub train_a_obj: Box<Train>,
    #[serde(rename = "trainBObj")]
    pub train_b_obj: Box<Train>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopLineConflict {
    pub block_id: String,
    #[serde(rename = "leadingTrain")]
    pub leading_train: String,
    #[serde(rename = "followingTrain")]
    pub following_train: String,
    #[serde(rename = "timeDiff")]
    pub time_diff: i64,
    #[serde(rename = "leadingTrainObj")]
    pub leading_train_obj: Box<Train>,
    #[serde(rename = "followingTrainObj")]
    pub following_train_obj: Box<Train>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionConflict {
    pub junction_id: String,
    pub train1: String,
    pub train2: String,
    #[serde(rename = "timeGap")]
    pub time_gap: f64,
    #[serde(rename = "clearanceNeeded")]
    pub clearance_needed: f64,
    pub severity: Severity,
    pub route1: String,
    pub route2: String,
    #[serde(rename = "train1Obj")]
    pub train1_obj: Box<Train>,
    #[serde(rename = "train2Obj")]
    pub train2_obj: Box<Train>,
}

/// A detected unsafe overlap. Re-derived on every pass; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conflict {
    SameBlock(BlockConflict),
    LoopLine(LoopLineConflict),
    Junction(JunctionConflict),
}

impl Conflict {
    /// Parse a conflict as it travels on the wire. A payload that matches no
    /// known shape, or lacks a train snapshot, is a structural error.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::Structural` if the payload cannot be read as a conflict.
    pub fn from_json(json: &str) -> Result<Self, ResolutionError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub const fn conflict_type(&self) -> ConflictType {
        match self {
            Self::SameBlock(_) => ConflictType::SameBlock,
            Self::LoopLine(_) => ConflictType::LoopLine,
            Self::Junction(_) => ConflictType::Junction,
        }
    }

    /// Block or junction the trains contend for
    #[must_use]
    pub fn resource_id(&self) -> &str {
        match self {
            Self::SameBlock(c) => &c.block_id,
            Self::LoopLine(c) => &c.block_id,
            Self::Junction(c) => &c.junction_id,
        }
    }

    /// Participant ids in canonical order: priority candidate first
    #[must_use]
    pub fn participant_ids(&self) -> (&str, &str) {
        match self {
            Self::SameBlock(c) => (&c.train_a, &c.train_b),
            Self::LoopLine(c) => (&c.leading_train, &c.following_train),
            Self::Junction(c) => (&c.train1, &c.train2),
        }
    }

    /// Train snapshots in canonical order: priority candidate first
    #[must_use]
    pub fn snapshots(&self) -> (&Train, &Train) {
        match self {
            Self::SameBlock(c) => (&c.train_a_obj, &c.train_b_obj),
            Self::LoopLine(c) => (&c.leading_train_obj, &c.following_train_obj),
            Self::Junction(c) => (&c.train1_obj, &c.train2_obj),
        }
    }

    #[must_use]
    pub fn key(&self) -> ConflictKey {
        let (first, second) = self.participant_ids();
        ConflictKey {
            conflict_type: self.conflict_type(),
            resource_id: self.resource_id().to_string(),
            participants: [first.to_string(), second.to_string()],
        }
    }

    #[must_use]
    pub fn involves(&self, train_id: &str) -> bool {
        let (first, second) = self.participant_ids();
        first == train_id || second == train_id
    }

    /// Gap between the two movements in minutes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gap_minutes(&self) -> f64 {
        match self {
            Self::SameBlock(c) => c.time_diff as f64,
            Self::LoopLine(c) => c.time_diff as f64,
            Self::Junction(c) => c.time_gap,
        }
    }

    /// Loop-line conflicts carry no severity tier
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        match self {
            Self::SameBlock(c) => Some(c.severity),
            Self::LoopLine(_) => None,
            Self::Junction(c) => Some(c.severity),
        }
    }

    /// Get a short name for the conflict type
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::SameBlock(_) => "Same-block Conflict",
            Self::LoopLine(_) => "Loop-line Conflict",
            Self::Junction(_) => "Junction Conflict",
        }
    }

    /// Human-readable description of the conflict
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::SameBlock(c) => format!(
                "Opposing trains {} and {} in block {}",
                c.train_a, c.train_b, c.block_id
            ),
            Self::LoopLine(c) => format!(
                "Train {} must be held in loop line behind train {} in block {}",
                c.following_train, c.leading_train, c.block_id
            ),
            Self::Junction(c) => format!(
                "Trains {} and {} converging at junction {} ({:.1} min gap, needs {:.1} min)",
                c.train1, c.train2, c.junction_id, c.time_gap, c.clearance_needed
            ),
        }
    }
}
