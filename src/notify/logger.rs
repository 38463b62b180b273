//! Notifier writing through the `log` facade
//!
//! Useful when notifications should end up wherever the process log goes.
//! Option: `level = "error" | "warn" | "info" | "debug" | "trace"` (default `warn`).

use super::{string_option, Notifier, Payload};
use crate::error::{ConfigError, DeliveryError};
use log::Level;
use std::str::FromStr;

pub struct LogNotifier {
    level: Level,
}

impl LogNotifier {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Build from a `[notifiers.log]` table
    pub fn from_options(options: &toml::Table) -> Result<Box<dyn Notifier>, ConfigError> {
        let level = match string_option(options, "log", "level")? {
            None => Level::Warn,
            Some(name) => Level::from_str(name).map_err(|_| ConfigError::InvalidValue {
                key: "notifiers.log.level".to_string(),
                message: format!("unknown log level '{}'", name),
            })?,
        };
        Ok(Box::new(Self::new(level)))
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(Level::Warn)
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, payload: &Payload) -> Result<(), DeliveryError> {
        log::log!(
            target: "alertflow::notification",
            self.level,
            "{} is {}: {} [rule={} channel={} contact={} address={}]",
            payload.check_id,
            payload.state,
            payload.summary,
            payload.rule_id,
            payload.channel_id,
            payload.contact_id,
            payload.address
        );
        Ok(())
    }

    fn kind(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(LogNotifier::default().level(), Level::Warn);
    }

    #[test]
    fn test_level_option() {
        let table: toml::Table = toml::from_str("level = \"info\"").unwrap();
        assert!(LogNotifier::from_options(&table).is_ok());

        let table: toml::Table = toml::from_str("level = \"loud\"").unwrap();
        assert!(matches!(
            LogNotifier::from_options(&table),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
