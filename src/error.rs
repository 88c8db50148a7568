//! Error types for the conflict engine.
//!
//! Each failure class is its own enum so callers can tell a structural
//! problem (the request cannot be formed) from a degraded external service
//! (which the adapter turns into a fallback resolution) and from misuse of the
//! dispatcher.

use std::time::Duration;

use thiserror::Error;

use crate::conflict::ConflictKey;
use crate::models::TrainStatus;

/// Failures that abort a single resolution attempt.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Unknown conflict structure: {reason}")]
    Structural { reason: String },

    #[error("Train {0} is not in the active set")]
    MissingTrain(String),

    #[error("A resolution for {0} is already in flight")]
    AlreadyPending(ConflictKey),

    #[error("Resolution for {0} was discarded because the train set changed")]
    Discarded(ConflictKey),
}

impl From<serde_json::Error> for ResolutionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Structural {
            reason: err.to_string(),
        }
    }
}

/// Failures talking to the decision service. Never surfaced to callers as
/// errors; the adapter maps every variant to a fallback resolution.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid decision response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0}")]
    Unsuccessful(String),

    #[error("Decision service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid decision request: {0}")]
    InvalidRequest(#[source] serde_json::Error),
}

/// Misuse of the dispatcher's state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Train {0} not found")]
    UnknownTrain(String),

    #[error("Train {0} is already in the active set")]
    DuplicateTrain(String),

    #[error("Fallback resolution for {0} requires manual intervention and cannot be accepted")]
    FallbackNotAcceptable(String),

    #[error("Train {train} is {status}, cannot move to {target}")]
    InvalidTransition {
        train: String,
        status: TrainStatus,
        target: TrainStatus,
    },

    #[error("Train {train} is under review for another conflict, not {key}")]
    StaleResolution { train: String, key: String },
}

/// Failures reading a timetable.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read timetable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// Failures loading engine settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
