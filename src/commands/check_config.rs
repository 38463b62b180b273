//! Check-config command implementation
//!
//! Validates the configuration the way `run` would and prints a summary.

use super::load_config;
use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, ConfigSummary};
use crate::config::{Config, ConfigFile};
use crate::error::{QueueError, Result};
use crate::notify::{DispatchMode, NotifierRegistry};
use crate::queue::QueueRegistry;
use crate::services::Setup;

/// Execute the check-config command
pub fn run_check_config(config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let source = config_path.map(str::to_string).or_else(|| {
        ConfigFile::default_paths()
            .into_iter()
            .find(|p| p.exists())
            .map(|p| p.display().to_string())
    });

    let summary = summarize(
        &config,
        source,
        &QueueRegistry::with_builtin(),
        &NotifierRegistry::with_builtin(),
    )?;
    print_output(&summary, format)?;

    Ok(())
}

/// Validate a configuration and describe it
///
/// Fails on anything that would stop `run` from starting except opening
/// the queue and the store.
pub fn summarize(
    config: &Config,
    source: Option<String>,
    queues: &QueueRegistry,
    notifiers: &NotifierRegistry,
) -> Result<ConfigSummary> {
    let setup = Setup::from_config(config)?;

    let backend = config.queue.backend.to_lowercase();
    if !queues.kinds().contains(&backend.as_str()) {
        return Err(QueueError::UnknownBackend(config.queue.backend.clone()).into());
    }

    let mut channel_types: Vec<String> = setup
        .recipients
        .kinds()
        .into_iter()
        .map(str::to_string)
        .collect();
    for kind in config.notifiers.keys() {
        if !channel_types.contains(kind) {
            channel_types.push(kind.clone());
        }
    }
    channel_types.sort();

    let empty = toml::Table::new();
    let mut unhandled_types = Vec::new();
    for kind in &channel_types {
        let options = config.notifiers.get(kind).unwrap_or(&empty);
        match notifiers.build(kind, options) {
            Some(handler) => {
                handler?;
            }
            None => unhandled_types.push(kind.clone()),
        }
    }

    let (tags, rules, checks) = setup.router.with_index(|index| {
        (index.tags().count(), index.rules().count(), index.checks().count())
    });

    Ok(ConfigSummary {
        source,
        queue: backend,
        queue_name: config.queue.queue_name.clone(),
        store: config
            .store
            .path
            .as_ref()
            .map_or_else(|| "memory".to_string(), |p| p.display().to_string()),
        dispatch: match config.general.dispatch {
            DispatchMode::Inline => "inline".to_string(),
            DispatchMode::Background => "background".to_string(),
        },
        initial_delay_secs: config.escalation.initial_delay_secs,
        repeat_delay_secs: config.escalation.repeat_delay_secs,
        contacts: setup.recipients.contacts().len(),
        channels: setup.recipients.channel_count(),
        channel_types,
        unhandled_types,
        tags,
        rules,
        checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, ConfigError};

    const CONFIG: &str = r#"
        [queue]
        type = "memory"

        [store]
        path = "/var/lib/alertflow/state.json"

        [notifiers.log]
        level = "info"

        [[recipients.list]]
        id = "ops"
        [[recipients.list.channels]]
        id = "ops-log"
        type = "log"
        address = "ops"
        [[recipients.list.channels]]
        id = "ops-pager"
        type = "pager"
        address = "+15550100"

        [[checks]]
        id = "db01:disk"
        tags = ["disk", "db"]

        [[rules]]
        id = "disk"
        tags = ["disk"]
        channels = ["ops-log", "ops-pager"]
    "#;

    fn summary(config: &Config) -> Result<ConfigSummary> {
        summarize(
            config,
            Some("test.toml".to_string()),
            &crate::mock::memory_registry(),
            &NotifierRegistry::with_builtin(),
        )
    }

    #[test]
    fn test_summarize_valid_config() {
        let config = ConfigFile::parse(CONFIG).unwrap();
        let summary = summary(&config).unwrap();

        assert_eq!(summary.queue, "memory");
        assert_eq!(summary.store, "/var/lib/alertflow/state.json");
        assert_eq!(summary.dispatch, "background");
        assert_eq!(summary.contacts, 1);
        assert_eq!(summary.channels, 2);
        assert_eq!(summary.channel_types, vec!["log", "pager"]);
        assert_eq!(summary.unhandled_types, vec!["pager"]);
        assert_eq!((summary.tags, summary.rules, summary.checks), (2, 1, 1));
    }

    #[test]
    fn test_unknown_queue_backend() {
        let mut config = ConfigFile::parse(CONFIG).unwrap();
        config.queue.backend = "carrier-pigeon".to_string();

        assert!(matches!(
            summary(&config),
            Err(AppError::Queue(QueueError::UnknownBackend(_)))
        ));
    }

    #[test]
    fn test_invalid_notifier_options() {
        let mut config = ConfigFile::parse(CONFIG).unwrap();
        config
            .notifiers
            .get_mut("log")
            .unwrap()
            .insert("level".to_string(), toml::Value::String("loud".to_string()));

        assert!(matches!(
            summary(&config),
            Err(AppError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
