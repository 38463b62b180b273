//! Check state and dependency tracking
//!
//! Owns every known [`Check`]. Checks are created the first time a result
//! (or a definition) names them. Parent suppression looks at direct parents
//! only; a failing grandparent does not suppress a grandchild.

use crate::domain::{Check, CheckResult, Ingest, MaintenanceKind, MaintenanceWindow};
use crate::error::DomainError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Registry of checks and their state
#[derive(Debug, Default)]
pub struct CheckTracker {
    checks: BTreeMap<String, Check>,
}

impl CheckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted check, replacing whatever is known about it
    pub fn restore(&mut self, check: Check) {
        self.checks.insert(check.id.clone(), check);
    }

    /// Apply a configured definition (parents, maintenance windows)
    ///
    /// Keeps any state already known for the check. Windows already present
    /// are not added twice.
    pub fn define(&mut self, definition: Check) {
        let check = self
            .checks
            .entry(definition.id.clone())
            .or_insert_with(|| Check::new(definition.id.clone()));

        check.parents = definition.parents;
        for window in definition.maintenance {
            if !check.maintenance.contains(&window) {
                check.maintenance.push(window);
            }
        }
    }

    /// Apply a result, creating the check if it is not known yet
    pub fn ingest(&mut self, result: &CheckResult) -> Ingest {
        self.checks
            .entry(result.check_id.clone())
            .or_insert_with(|| {
                log::debug!("First result for check {}", result.check_id);
                Check::new(result.check_id.clone())
            })
            .apply(result)
    }

    pub fn get(&self, id: &str) -> Option<&Check> {
        self.checks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.checks.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        self.checks.values()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Whether a maintenance window of the check covers `at`
    pub fn in_maintenance(&self, id: &str, at: DateTime<Utc>) -> bool {
        self.checks.get(id).is_some_and(|c| c.in_maintenance(at))
    }

    /// Direct parents that are currently failing
    ///
    /// Parents that have never reported are not failing.
    pub fn failed_parents(&self, id: &str) -> Vec<&str> {
        let Some(check) = self.checks.get(id) else {
            return Vec::new();
        };

        check
            .parents
            .iter()
            .filter(|p| self.checks.get(p.as_str()).is_some_and(Check::is_failing))
            .map(String::as_str)
            .collect()
    }

    pub fn any_parent_failed(&self, id: &str) -> bool {
        !self.failed_parents(id).is_empty()
    }

    /// Add a scheduled maintenance window
    pub fn add_scheduled_maintenance(
        &mut self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        summary: Option<String>,
    ) -> Result<(), DomainError> {
        let window = MaintenanceWindow::scheduled(start, end, summary)?;
        self.entry(id).maintenance.push(window);
        log::info!("Scheduled maintenance for {} from {} to {}", id, start, end);
        Ok(())
    }

    /// Open an unscheduled maintenance window
    pub fn start_unscheduled_maintenance(
        &mut self,
        id: &str,
        start: DateTime<Utc>,
        summary: Option<String>,
    ) {
        self.entry(id)
            .maintenance
            .push(MaintenanceWindow::unscheduled(start, summary));
        log::info!("Unscheduled maintenance for {} started at {}", id, start);
    }

    /// Close every open unscheduled window of a check at `at`
    ///
    /// Returns the number of windows closed.
    ///
    /// # Errors
    /// Returns `DomainError::UnknownCheck` if the check is not known
    pub fn end_unscheduled_maintenance(
        &mut self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let check = self
            .checks
            .get_mut(id)
            .ok_or_else(|| DomainError::UnknownCheck(id.to_string()))?;

        let mut closed = 0;
        for window in check.maintenance.iter_mut().filter(|w| {
            w.kind == MaintenanceKind::Unscheduled && w.end.is_none() && w.start <= at
        }) {
            window.end = Some(at);
            closed += 1;
        }

        if closed > 0 {
            log::info!("Unscheduled maintenance for {} ended at {}", id, at);
        }
        Ok(closed)
    }

    /// Drop a check's windows that ended before `at`
    pub fn prune_maintenance(&mut self, id: &str, at: DateTime<Utc>) -> usize {
        self.checks
            .get_mut(id)
            .map_or(0, |c| c.prune_maintenance(at))
    }

    fn entry(&mut self, id: &str) -> &mut Check {
        self.checks
            .entry(id.to_string())
            .or_insert_with(|| Check::new(id))
    }
}
