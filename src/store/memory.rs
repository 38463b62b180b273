//! In-memory state store

use super::{Snapshot, StateStore};
use crate::domain::Check;
use crate::error::StoreError;
use crate::escalation::NotificationState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Store keeping state for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing state
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful `persist` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored copy of a check
    pub fn check(&self, id: &str) -> Option<Check> {
        self.lock().checks.get(id).cloned()
    }

    /// Stored notification states of a check
    pub fn states_for(&self, id: &str) -> Vec<NotificationState> {
        self.lock().notifications.get(id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.lock().clone())
    }

    fn persist(&self, check: &Check, states: &[NotificationState]) -> Result<(), StoreError> {
        self.lock().record(check, states);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
