#![allow(clippy::implicit_hasher)]

pub mod config;
pub mod conflict;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod import;
pub mod models;
pub mod performance;
pub mod resolution;
pub mod time;

pub use config::{DetectionSettings, EngineSettings};
pub use conflict::{detect_all, Conflict, ConflictKey, ConflictType, DetectionReport, Severity};
pub use dispatcher::{AcceptOutcome, Dispatcher};
pub use models::{ApproachDirection, Train, TrainStatus};
pub use resolution::{Decision, Resolution, ResolutionDesk};
