//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging.
//!
//! The file carries the engine settings (queue, store, escalation defaults,
//! delivery handlers) and the routing entities the engine starts with
//! (recipients, tags, rules, checks).

pub mod builder;
pub mod file;
pub mod recipients;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;
pub use recipients::load_recipients;

use crate::domain::{Check, MaintenanceWindow, Rule, TimeRestriction};
use crate::error::ConfigError;
use crate::escalation::Delays;
use crate::notify::DispatchMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Queue backend selection
    pub queue: QueueConfig,
    /// Default escalation delays
    pub escalation: EscalationConfig,
    /// State store settings
    pub store: StoreConfig,
    /// Delivery handler settings keyed by channel type
    pub notifiers: BTreeMap<String, toml::Table>,
    /// Contacts and their channels
    pub recipients: RecipientsConfig,
    /// Tags and the checks carrying them
    pub tags: Vec<TagConfig>,
    /// Routing rules
    pub rules: Vec<RuleConfig>,
    /// Check definitions (parents, maintenance)
    pub checks: Vec<CheckConfig>,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// How notifications are handed to delivery handlers
    pub dispatch: DispatchMode,
}

/// Queue backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Backend type key
    #[serde(rename = "type")]
    pub backend: String,
    /// Backend host
    pub host: String,
    /// Backend port
    pub port: u16,
    /// Queue to consume
    pub queue_name: String,
    /// Backend-specific extras
    pub options: toml::Table,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: "directory".to_string(),
            host: "localhost".to_string(),
            port: 11300,
            queue_name: "results".to_string(),
            options: toml::Table::new(),
        }
    }
}

/// Default escalation delays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Wait after a failure episode starts before the first notification
    pub initial_delay_secs: u64,
    /// Minimum spacing between repeat notifications
    pub repeat_delay_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 30,
            repeat_delay_secs: 60,
        }
    }
}

impl EscalationConfig {
    /// Convert to scheduler delays
    pub fn to_delays(&self) -> Delays {
        Delays::new(
            Duration::from_secs(self.initial_delay_secs),
            Duration::from_secs(self.repeat_delay_secs),
        )
    }
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file; state is kept in memory only when unset
    pub path: Option<PathBuf>,
}

/// Recipients configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecipientsConfig {
    /// TOML file with `[[contacts]]` entries
    pub filename: Option<PathBuf>,
    /// Inline contacts, merged after the file
    pub list: Vec<ContactConfig>,
}

/// Contact entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Contact identifier
    pub id: String,
    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,
    /// Channels owned by the contact
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Channel entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel identifier
    pub id: String,
    /// Delivery type key
    #[serde(rename = "type")]
    pub kind: String,
    /// Destination address
    pub address: String,
    /// Override of the initial delay in seconds
    #[serde(default)]
    pub initial_delay_secs: Option<u64>,
    /// Override of the repeat delay in seconds
    #[serde(default)]
    pub repeat_delay_secs: Option<u64>,
}

/// Tag entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    /// Tag name (also its identifier)
    pub name: String,
    /// Checks carrying the tag
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Rule entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule identifier
    pub id: String,
    /// Required tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Channels to notify
    pub channels: Vec<String>,
    /// Optional notification window
    #[serde(default)]
    pub restriction: Option<RestrictionConfig>,
}

/// Time restriction entry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RestrictionConfig {
    /// Day names (`mon`, `tuesday`, ...); empty means every day
    pub days: Vec<String>,
    /// Start time of day, `HH:MM`
    pub start: Option<String>,
    /// End time of day, `HH:MM`
    pub end: Option<String>,
}

/// Check entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Check identifier
    pub id: String,
    /// Direct parent checks
    #[serde(default)]
    pub parents: Vec<String>,
    /// Tags carried by the check (in addition to `[[tags]]` membership)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Maintenance windows
    #[serde(default)]
    pub maintenance: Vec<MaintenanceConfig>,
}

/// Maintenance window entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Start, RFC 3339
    pub start: DateTime<Utc>,
    /// End, RFC 3339; omitted for an open unscheduled window
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Reason
    #[serde(default)]
    pub summary: Option<String>,
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl RuleConfig {
    /// Convert to a Rule
    pub fn to_rule(&self) -> Result<Rule, ConfigError> {
        let mut rule = Rule::new(self.id.clone(), self.channels.iter().cloned())
            .map_err(|e| invalid("rules.channels", e.to_string()))?
            .with_tags(self.tags.iter().cloned());

        if let Some(restriction) = &self.restriction {
            rule = rule.with_restriction(restriction.to_restriction()?);
        }

        Ok(rule)
    }
}

impl RestrictionConfig {
    /// Convert to a TimeRestriction
    pub fn to_restriction(&self) -> Result<TimeRestriction, ConfigError> {
        let days = self
            .days
            .iter()
            .map(|d| TimeRestriction::parse_day(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid("rules.restriction.days", e.to_string()))?;

        match (&self.start, &self.end) {
            (None, None) => Ok(TimeRestriction::days(days)),
            (Some(start), Some(end)) => {
                let start = TimeRestriction::parse_time(start)
                    .map_err(|e| invalid("rules.restriction.start", e.to_string()))?;
                let end = TimeRestriction::parse_time(end)
                    .map_err(|e| invalid("rules.restriction.end", e.to_string()))?;
                Ok(TimeRestriction::new(days, start, end))
            }
            _ => Err(invalid(
                "rules.restriction",
                "start and end must be given together",
            )),
        }
    }
}

impl CheckConfig {
    /// Convert to a Check definition
    pub fn to_check(&self) -> Result<Check, ConfigError> {
        let mut check = Check::new(self.id.clone()).with_parents(self.parents.iter().cloned());

        for window in &self.maintenance {
            let window = match window.end {
                Some(end) => MaintenanceWindow::scheduled(window.start, end, window.summary.clone())
                    .map_err(|e| invalid("checks.maintenance", e.to_string()))?,
                None => MaintenanceWindow::unscheduled(window.start, window.summary.clone()),
            };
            check = check.with_maintenance(window);
        }

        Ok(check)
    }
}
