//! Notification delivery
//!
//! Delivery handlers implement [`Notifier`] and are registered by channel
//! type key in a [`NotifierRegistry`]. The [`Dispatcher`] owns one handler
//! per configured type and hands it payloads, either on the caller's thread
//! or through a per-type worker thread.

pub mod dispatcher;
pub mod logger;
pub mod terminal;

pub use dispatcher::Dispatcher;
pub use logger::LogNotifier;
pub use terminal::TerminalNotifier;

use crate::domain::{Channel, CheckResult, CheckState};
use crate::error::{ConfigError, DeliveryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Delivery handler trait
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    fn notify(&self, payload: &Payload) -> Result<(), DeliveryError>;

    /// Channel type key this handler delivers
    fn kind(&self) -> &str;
}

/// Everything a handler needs to deliver one notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub check_id: String,
    pub state: CheckState,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub channel_id: String,
    pub contact_id: String,
    pub kind: String,
    pub address: String,
}

impl Payload {
    /// Payload for a result routed to a channel by a rule
    pub fn new(result: &CheckResult, channel: &Channel, rule_id: &str) -> Self {
        Self {
            check_id: result.check_id.clone(),
            state: result.state,
            summary: result.summary.clone(),
            timestamp: result.timestamp,
            rule_id: rule_id.to_string(),
            channel_id: channel.id.clone(),
            contact_id: channel.contact_id.clone(),
            kind: channel.kind.clone(),
            address: channel.address.clone(),
        }
    }
}

/// How payloads reach handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Handlers run on the processing thread
    Inline,
    /// One worker thread per handler type
    #[default]
    Background,
}

/// Constructor for a handler from its `[notifiers.<type>]` table
pub type NotifierConstructor = fn(&toml::Table) -> Result<Box<dyn Notifier>, ConfigError>;

/// Registry mapping channel type keys to handler constructors
pub struct NotifierRegistry {
    constructors: BTreeMap<String, NotifierConstructor>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with the built-in `terminal` and `log` handlers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("terminal", TerminalNotifier::from_options);
        registry.register("log", LogNotifier::from_options);
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, constructor: NotifierConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the handler for a type, `None` if nothing is registered
    pub fn build(
        &self,
        kind: &str,
        options: &toml::Table,
    ) -> Option<Result<Box<dyn Notifier>, ConfigError>> {
        self.constructors.get(kind).map(|constructor| constructor(options))
    }

    /// Build a dispatcher with handlers for every type in use
    ///
    /// `kinds` are the channel types referenced by recipients; configured
    /// `[notifiers]` tables are passed to their handlers. Types without a
    /// registered handler are logged and left out, so channels of that type
    /// are skipped at dispatch time.
    pub fn dispatcher<'a, I>(
        &self,
        kinds: I,
        settings: &BTreeMap<String, toml::Table>,
        mode: DispatchMode,
    ) -> crate::error::Result<Dispatcher>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let empty = toml::Table::new();
        let mut dispatcher = Dispatcher::new(mode);

        let mut wanted: BTreeSet<String> = kinds.into_iter().map(str::to_string).collect();
        wanted.extend(settings.keys().cloned());

        for kind in &wanted {
            let options = settings.get(kind).unwrap_or(&empty);
            match self.build(kind, options) {
                Some(notifier) => dispatcher.add_notifier(notifier?)?,
                None => log::warn!(
                    "No delivery handler for channel type '{}', channels of that type will be skipped",
                    kind
                ),
            }
        }

        Ok(dispatcher)
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Read an optional string option from a handler table
pub(crate) fn string_option<'a>(
    options: &'a toml::Table,
    kind: &str,
    key: &str,
) -> Result<Option<&'a str>, ConfigError> {
    match options.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ConfigError::InvalidValue {
            key: format!("notifiers.{}.{}", kind, key),
            message: "expected a string".to_string(),
        }),
    }
}
