//! Per-vet mutual exclusion for the check-then-insert booking sequence.
//!
//! Bookings for different vets never contend. The guard only covers this
//! process; the IMMEDIATE transaction in `store` covers the rest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::ServiceError;

#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock shared by every booking for `vet_id`.
    pub fn lock_for(&self, vet_id: &str) -> Result<Arc<Mutex<()>>, ServiceError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ServiceError::Internal("slot lock table poisoned".into()))?;
        Ok(locks
            .entry(vet_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Run `f` while holding the lock for `vet_id`.
    pub fn with_vet<T>(
        &self,
        vet_id: &str,
        f: impl FnOnce() -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let lock = self.lock_for(vet_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ServiceError::Internal(format!("slot lock for vet {vet_id} poisoned")))?;
        f()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
