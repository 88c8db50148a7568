use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::Mutex;

use super::{resolve_pair, DecisionService, PendingResolutions, Resolution};
use crate::config::EngineSettings;
use crate::conflict::{Conflict, ConflictKey};
use crate::dispatcher::{AcceptOutcome, Dispatcher};
use crate::error::{DispatchError, ResolutionError};

/// Front desk for resolution requests against a shared dispatcher.
///
/// The dispatcher lock is only held to snapshot the pair and to apply
/// results, never across the call to the decision service.
pub struct ResolutionDesk<S> {
    dispatcher: Arc<Mutex<Dispatcher>>,
    service: S,
    pending: PendingResolutions,
    epoch: AtomicU64,
    timeout: Duration,
}

impl<S: DecisionService> ResolutionDesk<S> {
    #[must_use]
    pub fn new(dispatcher: Arc<Mutex<Dispatcher>>, service: S, timeout: Duration) -> Self {
        Self {
            dispatcher,
            service,
            pending: PendingResolutions::new(),
            epoch: AtomicU64::new(0),
            timeout,
        }
    }

    #[must_use]
    pub fn from_settings(dispatcher: Arc<Mutex<Dispatcher>>, service: S, settings: &EngineSettings) -> Self {
        Self::new(dispatcher, service, settings.decision_timeout())
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Mutex<Dispatcher>> {
        &self.dispatcher
    }

    #[must_use]
    pub fn is_pending(&self, key: &ConflictKey) -> bool {
        self.pending.is_pending(key)
    }

    /// Invalidate every request currently in flight
    pub fn teardown(&self) {
        let previous = self.epoch.fetch_add(1, Ordering::SeqCst);
        debug!("Resolution desk torn down at epoch {previous}");
    }

    /// Ask the decision service about `conflict`.
    ///
    /// Service failures come back as a fallback `Resolution`, not an error.
    ///
    /// # Errors
    ///
    /// - `AlreadyPending` if a request for the same conflict is in flight
    /// - `MissingTrain` if a participant is no longer active
    /// - `Discarded` if the desk was torn down or a participant was cleared
    ///   while waiting for the answer
    pub async fn request_resolution(&self, conflict: &Conflict) -> Result<Resolution, ResolutionError> {
        let key = conflict.key();
        let Some(_guard) = self.pending.try_acquire(&key) else {
            return Err(ResolutionError::AlreadyPending(key));
        };
        let epoch = self.epoch.load(Ordering::SeqCst);

        let pair = self.dispatcher.lock().await.canonical_pair(conflict)?;
        let resolution = resolve_pair(&self.service, &pair, self.timeout).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!("{key}: desk was torn down, discarding answer");
            return Err(ResolutionError::Discarded(key));
        }
        let dispatcher = self.dispatcher.lock().await;
        if !dispatcher.contains(&pair.priority.train_id) || !dispatcher.contains(&pair.affected.train_id) {
            warn!("{key}: participants left the active set, discarding answer");
            return Err(ResolutionError::Discarded(key));
        }

        Ok(resolution)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::accept`].
    pub async fn accept(&self, resolution: &Resolution) -> Result<AcceptOutcome, DispatchError> {
        self.dispatcher.lock().await.accept(resolution, Utc::now())
    }

    /// # Errors
    ///
    /// See [`Dispatcher::reject`].
    pub async fn reject(&self, resolution: &Resolution) -> Result<(), DispatchError> {
        self.dispatcher.lock().await.reject(resolution)
    }
}
