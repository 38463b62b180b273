//! Check-related domain types
//!
//! Provides the check state machine, maintenance windows and the outcome of
//! ingesting a result.

use super::result::CheckResult;
use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reported state of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    /// Everything is fine
    Ok,
    /// Attention recommended
    Warning,
    /// Action required
    Critical,
    /// Probe could not determine the state
    Unknown,
}

impl CheckState {
    /// Whether this state counts as a failure
    ///
    /// Unknown is treated as failing, both for notifications and for
    /// dependency suppression.
    pub const fn is_failing(&self) -> bool {
        !matches!(self, Self::Ok)
    }

    /// Lowercase wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for CheckState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" | "up" => Ok(Self::Ok),
            "warning" => Ok(Self::Warning),
            "critical" | "down" => Ok(Self::Critical),
            "unknown" => Ok(Self::Unknown),
            _ => Err(DomainError::InvalidState(s.to_string())),
        }
    }
}

/// Kind of maintenance window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceKind {
    /// Planned ahead with a fixed end
    Scheduled,
    /// Started ad hoc, usually by an operator acknowledging a problem
    Unscheduled,
}

/// A time range during which notifications for a check are suppressed
///
/// The range is half-open: `start <= t < end`. Unscheduled windows may be
/// open-ended until explicitly ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// Scheduled or unscheduled
    pub kind: MaintenanceKind,
    /// Start of the window
    pub start: DateTime<Utc>,
    /// End of the window, `None` while an unscheduled window is open
    pub end: Option<DateTime<Utc>>,
    /// Free-text reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl MaintenanceWindow {
    /// Create a scheduled window
    ///
    /// # Errors
    /// Returns `DomainError::InvalidMaintenanceWindow` if `end <= start`
    pub fn scheduled(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        summary: Option<String>,
    ) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvalidMaintenanceWindow(format!(
                "end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self {
            kind: MaintenanceKind::Scheduled,
            start,
            end: Some(end),
            summary,
        })
    }

    /// Open an unscheduled window at `start`
    pub fn unscheduled(start: DateTime<Utc>, summary: Option<String>) -> Self {
        Self {
            kind: MaintenanceKind::Unscheduled,
            start,
            end: None,
            summary,
        }
    }

    /// Whether the window covers the given instant
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && self.end.map_or(true, |end| at < end)
    }

    /// Whether the window has ended by the given instant
    pub fn has_ended(&self, at: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| end <= at)
    }
}

/// What ingesting a result did to a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingest {
    /// State before the result was applied (`None` for a never-seen check)
    pub previous: Option<CheckState>,
    /// State after the result was applied
    pub current: CheckState,
    /// The result was not newer than the last ingested one and was ignored
    pub replay: bool,
}

impl Ingest {
    /// The stored state changed
    pub fn is_transition(&self) -> bool {
        !self.replay && self.previous != Some(self.current)
    }

    /// The check went from failing back to ok
    pub fn is_recovery(&self) -> bool {
        self.is_transition()
            && self.current == CheckState::Ok
            && self.previous.is_some_and(|s| s.is_failing())
    }

    /// The check entered a failing state from ok (or from never being seen)
    pub fn starts_episode(&self) -> bool {
        self.is_transition()
            && self.current.is_failing()
            && !self.previous.is_some_and(|s| s.is_failing())
    }
}

/// A monitored check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Globally unique identifier, e.g. `db01:disk`
    pub id: String,
    /// Current state, `None` until the first result arrives
    #[serde(default)]
    pub state: Option<CheckState>,
    /// When the state last changed
    #[serde(default)]
    pub last_change: Option<DateTime<Utc>>,
    /// Timestamp of the last ingested result
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    /// Start of the current failure streak
    #[serde(default)]
    pub failing_since: Option<DateTime<Utc>>,
    /// Summary of the last ingested result
    #[serde(default)]
    pub summary: Option<String>,
    /// Direct parent check identifiers
    #[serde(default)]
    pub parents: Vec<String>,
    /// Maintenance windows
    #[serde(default)]
    pub maintenance: Vec<MaintenanceWindow>,
}

impl Check {
    /// Create a check that has never reported
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: None,
            last_change: None,
            last_update: None,
            failing_since: None,
            summary: None,
            parents: Vec::new(),
            maintenance: Vec::new(),
        }
    }

    /// Builder: set parent checks
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: add a maintenance window
    pub fn with_maintenance(mut self, window: MaintenanceWindow) -> Self {
        self.maintenance.push(window);
        self
    }

    /// Whether the check is currently failing
    pub fn is_failing(&self) -> bool {
        self.state.is_some_and(|s| s.is_failing())
    }

    /// Whether any maintenance window covers the given instant
    pub fn in_maintenance(&self, at: DateTime<Utc>) -> bool {
        self.maintenance.iter().any(|w| w.covers(at))
    }

    /// Apply a result to the check
    ///
    /// Results whose timestamp is not newer than the last ingested result
    /// are replays (e.g. queue re-delivery) and leave the check untouched.
    pub fn apply(&mut self, result: &CheckResult) -> Ingest {
        if self.last_update.is_some_and(|last| result.timestamp <= last) {
            return Ingest {
                previous: self.state,
                current: self.state.unwrap_or(result.state),
                replay: true,
            };
        }

        let previous = self.state;
        if previous != Some(result.state) {
            self.last_change = Some(result.timestamp);
        }

        if result.state.is_failing() {
            if !previous.is_some_and(|s| s.is_failing()) || self.failing_since.is_none() {
                self.failing_since = Some(result.timestamp);
            }
        } else {
            self.failing_since = None;
        }

        self.state = Some(result.state);
        self.last_update = Some(result.timestamp);
        self.summary = Some(result.summary.clone());

        Ingest {
            previous,
            current: result.state,
            replay: false,
        }
    }

    /// Drop maintenance windows that ended before the given instant
    pub fn prune_maintenance(&mut self, at: DateTime<Utc>) -> usize {
        let before = self.maintenance.len();
        self.maintenance.retain(|w| !w.has_ended(at));
        before - self.maintenance.len()
    }
}
