//! Owner of the active train set and the session counters.
//!
//! Every state change goes through a `&mut self` method that validates
//! first and mutates second, so a caller holding a shared reference never
//! observes a half-applied resolution.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{info, warn};

use crate::config::{DetectionSettings, EngineSettings};
use crate::conflict::{detect_all, Conflict, ConflictType, DetectionReport};
use crate::error::{DispatchError, ResolutionError};
use crate::models::{HistoryEntry, InMemoryHistory, Train, TrainHistory, TrainStatus};
use crate::performance::{PerformanceStats, PerformanceSummary, ResolutionRecord};
use crate::resolution::{CanonicalPair, Resolution};

const REJECTED_REASON: &str = "Recommendation rejected - manual intervention required";

/// What an accepted resolution changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptOutcome {
    pub delay_reduction: i64,
    pub resolution_time_secs: f64,
}

pub struct Dispatcher {
    trains: IndexMap<String, Train>,
    stats: PerformanceStats,
    history: Box<dyn TrainHistory + Send>,
    settings: DetectionSettings,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("trains", &self.trains.len())
            .field("stats", &self.stats)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(&EngineSettings::default())
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(settings: &EngineSettings) -> Self {
        Self::with_history(settings, Box::new(InMemoryHistory::new()))
    }

    #[must_use]
    pub fn with_history(settings: &EngineSettings, history: Box<dyn TrainHistory + Send>) -> Self {
        Self {
            trains: IndexMap::new(),
            stats: PerformanceStats::with_history_capacity(settings.history_capacity),
            history,
            settings: settings.detection.clone(),
        }
    }

    /// Add one train to the active set.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::DuplicateTrain` if the id is already active.
    pub fn add_train(&mut self, mut train: Train) -> Result<(), DispatchError> {
        if self.trains.contains_key(&train.train_id) {
            return Err(DispatchError::DuplicateTrain(train.train_id));
        }
        train.reset_runtime();
        self.trains.insert(train.train_id.clone(), train);
        Ok(())
    }

    /// Add a timetable, skipping ids that are already active. Returns how
    /// many trains were added.
    pub fn load_trains(&mut self, trains: impl IntoIterator<Item = Train>) -> usize {
        let mut loaded = 0;
        for train in trains {
            match self.add_train(train) {
                Ok(()) => loaded += 1,
                Err(err) => warn!("{err}, skipping"),
            }
        }
        info!("Loaded {loaded} trains ({} active)", self.trains.len());
        loaded
    }

    /// Active trains in load order
    pub fn trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    #[must_use]
    pub fn train(&self, train_id: &str) -> Option<&Train> {
        self.trains.get(train_id)
    }

    #[must_use]
    pub fn contains(&self, train_id: &str) -> bool {
        self.trains.contains_key(train_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }

    #[must_use]
    pub fn history(&self) -> &dyn TrainHistory {
        self.history.as_ref()
    }

    /// Counters plus the derived dashboard figures
    #[must_use]
    pub fn summary(&self) -> PerformanceSummary {
        let active = self.trains.values().filter(|t| t.needs_attention()).count();
        self.stats.summary(active, active > 0)
    }

    /// Set a train's delay in minutes.
    ///
    /// Trains under conflict handling keep their status; the rest become
    /// `DELAYED` or `ON_TIME` depending on the new delay.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownTrain` if the id is not active.
    pub fn inject_delay(&mut self, train_id: &str, delay: i64) -> Result<(), DispatchError> {
        let train = self
            .trains
            .get_mut(train_id)
            .ok_or_else(|| DispatchError::UnknownTrain(train_id.to_string()))?;

        train.delay = delay;
        let next = if delay == 0 {
            TrainStatus::OnTime
        } else {
            TrainStatus::Delayed
        };
        if !train.status.is_handling_conflict() && train.status.can_transition_to(next) {
            train.status = next;
        }
        info!("Train {train_id} delay set to {delay} min ({})", train.status);
        Ok(())
    }

    /// Run every detector over the active set, update the counters and flag
    /// the participants.
    pub fn detect(&mut self, now: DateTime<Utc>) -> DetectionReport {
        let snapshot: Vec<Train> = self.trains.values().cloned().collect();
        let report = detect_all(&snapshot, now, &self.settings);

        for conflict_type in ConflictType::ALL {
            self.stats.record_detection(conflict_type, report.count(conflict_type));
        }
        for conflict in report.iter() {
            self.flag(conflict);
        }

        report
    }

    fn flag(&mut self, conflict: &Conflict) {
        let key = conflict.key();
        let (first, second) = conflict.participant_ids();
        for train_id in [first, second] {
            let Some(train) = self.trains.get_mut(train_id) else {
                continue;
            };
            if !train.status.can_transition_to(TrainStatus::InConflict) {
                continue;
            }
            // A rejected conflict stays with the operator until something else comes up
            if train.status == TrainStatus::ManualReview && train.review_of.as_ref() == Some(&key) {
                continue;
            }
            info!("Train {train_id}: {} -> IN_CONFLICT ({key})", train.status);
            train.status = TrainStatus::InConflict;
            train.conflict = true;
            train.conflict_reason = Some(conflict.message());
            train.review_of = None;
        }
    }

    /// Pair a conflict's participants using their current state.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::MissingTrain` if either participant has
    /// left the active set.
    pub fn canonical_pair(&self, conflict: &Conflict) -> Result<CanonicalPair, ResolutionError> {
        let (priority_id, affected_id) = conflict.participant_ids();
        let live = |id: &str| {
            self.trains
                .get(id)
                .cloned()
                .ok_or_else(|| ResolutionError::MissingTrain(id.to_string()))
        };

        let mut pair = CanonicalPair::from_conflict(conflict);
        pair.priority = live(priority_id)?;
        pair.affected = live(affected_id)?;
        Ok(pair)
    }

    /// Apply a resolution: the reduced train is resolved with its new delay
    /// and speed, the priority train is released.
    ///
    /// # Errors
    ///
    /// - `FallbackNotAcceptable` for a fallback
    /// - `UnknownTrain` if a named train is not active
    /// - `InvalidTransition` if the reduced train is not in conflict or
    ///   under review, so a resolution is applied at most once
    /// - `StaleResolution` if the reduced train is under review for a
    ///   different conflict
    ///
    /// Nothing is changed on error.
    pub fn accept(
        &mut self,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, DispatchError> {
        if resolution.is_fallback() {
            return Err(DispatchError::FallbackNotAcceptable(
                resolution.conflict_key.to_string(),
            ));
        }
        for id in [&resolution.reduced_train, &resolution.priority_train] {
            if !self.trains.contains_key(id) {
                return Err(DispatchError::UnknownTrain(id.clone()));
            }
        }
        if let Some(reduced) = self.trains.get(&resolution.reduced_train) {
            Self::check_handling(reduced, resolution, TrainStatus::Resolved)?;
        }

        let delay_reduction = resolution.delay_reduction();
        #[allow(clippy::cast_precision_loss)]
        let resolution_time_secs =
            ((now - resolution.requested_at).num_milliseconds().max(0) as f64) / 1000.0;

        if let Some(reduced) = self.trains.get_mut(&resolution.reduced_train) {
            reduced.delay += resolution.suggested_delay.unwrap_or(0);
            if delay_reduction > 0 {
                reduced.delay = (reduced.delay - delay_reduction).max(0);
            }
            if let Some(speed) = resolution.suggested_speed {
                reduced.max_speed = speed;
            }
            reduced.status = TrainStatus::Resolved;
            reduced.conflict = false;
            reduced.resolved_at = Some(now);
            reduced.conflict_reason = Some(format!("Resolved: {}", resolution.decision));
            reduced.resolution_applied = Some(resolution.decision);
            reduced.review_of = None;
        }

        if resolution.priority_train != resolution.reduced_train {
            if let Some(priority) = self
                .trains
                .get_mut(&resolution.priority_train)
                .filter(|t| t.status.can_transition_to(TrainStatus::OnTime))
            {
                priority.status = TrainStatus::OnTime;
                priority.conflict = false;
                priority.conflict_reason = None;
                priority.review_of = None;
            }
        }

        self.stats.record_resolution(ResolutionRecord::new(
            resolution,
            now,
            resolution_time_secs,
        ));

        info!(
            "{}: accepted {} for {}, delay reduced by {delay_reduction} min",
            resolution.conflict_key, resolution.decision, resolution.reduced_train
        );

        Ok(AcceptOutcome {
            delay_reduction,
            resolution_time_secs,
        })
    }

    /// Hand the affected train to manual review.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownTrain` if the reduced train is not
    /// active, or `DispatchError::InvalidTransition` unless it is
    /// `IN_CONFLICT`. Nothing is changed on error.
    pub fn reject(&mut self, resolution: &Resolution) -> Result<(), DispatchError> {
        let train = self
            .trains
            .get_mut(&resolution.reduced_train)
            .ok_or_else(|| DispatchError::UnknownTrain(resolution.reduced_train.clone()))?;
        Self::check_handling(train, resolution, TrainStatus::ManualReview)?;

        train.status = TrainStatus::ManualReview;
        train.conflict = true;
        train.conflict_reason = Some(REJECTED_REASON.to_string());
        train.review_of = Some(resolution.conflict_key.clone());
        self.stats.record_rejection();

        info!(
            "{}: rejected, train {} sent to manual review",
            resolution.conflict_key, resolution.reduced_train
        );
        Ok(())
    }

    /// The reduced train must be able to take `target` for this resolution's conflict
    fn check_handling(
        train: &Train,
        resolution: &Resolution,
        target: TrainStatus,
    ) -> Result<(), DispatchError> {
        if !train.status.can_transition_to(target) {
            return Err(DispatchError::InvalidTransition {
                train: train.train_id.clone(),
                status: train.status,
                target,
            });
        }
        if train
            .review_of
            .as_ref()
            .is_some_and(|key| *key != resolution.conflict_key)
        {
            return Err(DispatchError::StaleResolution {
                train: train.train_id.clone(),
                key: resolution.conflict_key.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a train from the active set and archive it.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownTrain` if the id is not active.
    pub fn clear(&mut self, train_id: &str, now: DateTime<Utc>) -> Result<(), DispatchError> {
        let train = self
            .trains
            .shift_remove(train_id)
            .ok_or_else(|| DispatchError::UnknownTrain(train_id.to_string()))?;

        info!("Train {train_id} cleared from {}", train.status);
        self.history.record(HistoryEntry::from_cleared(train, now));
        self.stats.record_cleared();
        Ok(())
    }
}
