use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::conflict::ConflictKey;

/// Conflict keys with a decision request in flight.
///
/// At most one request per key. The slot is released when the returned
/// guard drops, whether the request finished, failed or was cancelled.
#[derive(Debug, Clone, Default)]
pub struct PendingResolutions {
    in_flight: Arc<Mutex<HashSet<ConflictKey>>>,
}

impl PendingResolutions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` if a request for it is already running
    #[must_use]
    pub fn try_acquire(&self, key: &ConflictKey) -> Option<PendingGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(PendingGuard {
            key: key.clone(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    #[must_use]
    pub fn is_pending(&self, key: &ConflictKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a conflict key's slot until dropped
#[derive(Debug)]
pub struct PendingGuard {
    key: ConflictKey,
    in_flight: Arc<Mutex<HashSet<ConflictKey>>>,
}

impl PendingGuard {
    #[must_use]
    pub fn key(&self) -> &ConflictKey {
        &self.key
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictType;

    fn key(resource: &str) -> ConflictKey {
        ConflictKey {
            conflict_type: ConflictType::SameBlock,
            resource_id: resource.to_string(),
            participants: ["A".to_string(), "B".to_string()],
        }
    }

    #[test]
    fn test_second_claim_is_refused() {
        let pending = PendingResolutions::new();
        let guard = pending.try_acquire(&key("B1")).expect("first claim");
        assert!(pending.try_acquire(&key("B1")).is_none());
        assert!(pending.is_pending(guard.key()));
    }

    #[test]
    fn test_independent_keys_coexist() {
        let pending = PendingResolutions::new();
        let _a = pending.try_acquire(&key("B1")).expect("B1");
        let _b = pending.try_acquire(&key("B2")).expect("B2");
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_drop_releases_slot() {
        let pending = PendingResolutions::new();
        {
            let _guard = pending.try_acquire(&key("B1")).expect("first claim");
        }
        assert!(pending.is_empty());
        assert!(pending.try_acquire(&key("B1")).is_some());
    }
}
