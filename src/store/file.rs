//! JSON snapshot file store
//!
//! Keeps the whole snapshot in memory and rewrites the file after every
//! `persist`. The file is written under a temporary name and renamed over
//! the old one, so a crash leaves either the previous or the new snapshot.

use super::{Snapshot, StateStore};
use crate::domain::Check;
use crate::error::StoreError;
use crate::escalation::NotificationState;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Store backed by one JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl JsonFileStore {
    /// Open a state file, reading it if it exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            log::debug!(
                "Read {} checks from {}",
                snapshot.checks.len(),
                path.display()
            );
            snapshot
        } else {
            Snapshot::default()
        };

        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let snapshot = self
            .snapshot
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(snapshot.clone())
    }

    fn persist(&self, check: &Check, states: &[NotificationState]) -> Result<(), StoreError> {
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut next = snapshot.clone();
        next.record(check, states);
        self.write(&next)?;
        *snapshot = next;
        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckResult, CheckState};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("state.json")).unwrap();
        assert!(store.load().unwrap().checks.is_empty());
    }

    #[test]
    fn test_persist_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut check = Check::new("db01:disk");
        check.apply(&CheckResult::new(
            "db01:disk",
            CheckState::Critical,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            "disk full",
        ));

        let store = JsonFileStore::open(&path).unwrap();
        store.persist(&check, &[]).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let snapshot = reopened.load().unwrap();
        assert_eq!(snapshot.checks.get("db01:disk"), Some(&check));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
