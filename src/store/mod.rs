//! Check and notification state persistence
//!
//! The processing loop persists a check together with its notification
//! states after every result, before the result is acknowledged. A store
//! replaces all state of a check in one step.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::config::StoreConfig;
use crate::domain::Check;
use crate::error::StoreError;
use crate::escalation::NotificationState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persistent store for check state
pub trait StateStore: Send + Sync {
    /// Load everything persisted so far
    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replace the stored check and its notification states
    fn persist(&self, check: &Check, states: &[NotificationState]) -> Result<(), StoreError>;

    /// Store name for identification
    fn name(&self) -> &str;
}

/// Persisted state of all checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub checks: BTreeMap<String, Check>,
    pub notifications: BTreeMap<String, Vec<NotificationState>>,
}

impl Snapshot {
    /// Replace one check's entry
    pub fn record(&mut self, check: &Check, states: &[NotificationState]) {
        self.checks.insert(check.id.clone(), check.clone());
        if states.is_empty() {
            self.notifications.remove(&check.id);
        } else {
            self.notifications.insert(check.id.clone(), states.to_vec());
        }
    }

    /// All notification states across checks
    pub fn notification_states(&self) -> impl Iterator<Item = &NotificationState> {
        self.notifications.values().flatten()
    }
}

/// Open the store selected by the configuration
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn StateStore>, StoreError> {
    match &config.path {
        Some(path) => {
            log::info!("Using state file {}", path.display());
            Ok(Box::new(JsonFileStore::open(path)?))
        }
        None => {
            log::info!("No [store] path configured, state is kept in memory only");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::Phase;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_record_replaces_states() {
        let check = Check::new("db01:disk");
        let state = NotificationState {
            check_id: "db01:disk".to_string(),
            channel_id: "m".to_string(),
            episode_start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            phase: Phase::Armed,
            last_notified: None,
        };

        let mut snapshot = Snapshot::default();
        snapshot.record(&check, &[state]);
        assert_eq!(snapshot.notification_states().count(), 1);

        snapshot.record(&check, &[]);
        assert_eq!(snapshot.notification_states().count(), 0);
        assert!(snapshot.checks.contains_key("db01:disk"));
    }

    #[test]
    fn test_open_store_defaults_to_memory() {
        let store = open_store(&StoreConfig::default()).unwrap();
        assert_eq!(store.name(), "memory");
    }
}
