//! Engine assembly from configuration
//!
//! Turns the routing entities of a [`Config`] into a validated recipients
//! lookup, a seeded [`Router`] and check definitions, then wires those into
//! a [`Processor`] with the configured queue, store and delivery handlers.

use crate::config::{load_recipients, Config};
use crate::domain::{Check, Recipients};
use crate::error::{AppError, ConfigError, DomainError};
use crate::notify::NotifierRegistry;
use crate::queue::{QueueBackend, QueueRegistry};
use crate::routing::{AssociationChange, Router, RoutingIndex};
use crate::services::Processor;
use crate::store::open_store;

use std::sync::Arc;

/// Validated routing entities
pub struct Setup {
    pub recipients: Recipients,
    pub router: Router,
    pub definitions: Vec<Check>,
}

impl Setup {
    /// Validate and index the configured recipients, tags, rules and checks
    ///
    /// # Errors
    /// Returns the first invalid entity: malformed recipients, an invalid
    /// tag name, a rule without channels or referring to an unknown tag or
    /// channel, or an invalid maintenance window
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let recipients = load_recipients(&config.recipients)?;
        let mut index = RoutingIndex::new();

        let tag_names = config
            .tags
            .iter()
            .map(|t| &t.name)
            .chain(config.checks.iter().flat_map(|c| c.tags.iter()));
        for name in tag_names {
            if index.tag(name).is_none() {
                index.apply(AssociationChange::CreateTag(name.clone()))?;
            }
        }

        let mut definitions = Vec::with_capacity(config.checks.len());
        for entry in &config.checks {
            definitions.push(entry.to_check()?);
            index.apply(AssociationChange::RegisterCheck(entry.id.clone()))?;
            for tag in &entry.tags {
                index.apply(AssociationChange::TagCheck {
                    tag: tag.clone(),
                    check: entry.id.clone(),
                })?;
            }
        }

        for tag in &config.tags {
            for check in &tag.checks {
                index.apply(AssociationChange::TagCheck {
                    tag: tag.name.clone(),
                    check: check.clone(),
                })?;
            }
        }

        for entry in &config.rules {
            let rule = entry.to_rule()?;
            if let Some(missing) = rule
                .channels
                .iter()
                .find(|c| recipients.channel(c).is_none())
            {
                return Err(ConfigError::InvalidValue {
                    key: format!("rules.{}.channels", rule.id),
                    message: format!("unknown channel '{}'", missing),
                }
                .into());
            }
            if index.rule(&rule.id).is_some() {
                return Err(ConfigError::InvalidValue {
                    key: "rules".to_string(),
                    message: format!("duplicate rule id '{}'", rule.id),
                }
                .into());
            }
            index
                .apply(AssociationChange::UpsertRule(rule))
                .map_err(|e| match e {
                    DomainError::UnknownTag(tag) => AppError::Config(ConfigError::InvalidValue {
                        key: format!("rules.{}.tags", entry.id),
                        message: format!("unknown tag '{}'", tag),
                    }),
                    other => other.into(),
                })?;
        }

        log::debug!(
            "Configured {} contacts, {} tags, {} rules, {} checks",
            recipients.contacts().len(),
            index.tags().count(),
            index.rules().count(),
            index.checks().count()
        );

        Ok(Self {
            recipients,
            router: Router::new(index),
            definitions,
        })
    }
}

/// Build a ready-to-run processor from configuration
///
/// Loads persisted state first, then applies configured check definitions
/// on top of it.
pub fn build_processor(
    config: &Config,
    queues: &QueueRegistry,
    notifiers: &NotifierRegistry,
) -> Result<Processor<Box<dyn QueueBackend>>, AppError> {
    let setup = Setup::from_config(config)?;

    let dispatcher = notifiers.dispatcher(
        setup.recipients.kinds(),
        &config.notifiers,
        config.general.dispatch,
    )?;
    let queue = queues.build(&config.queue)?;
    let store = open_store(&config.store)?;

    let mut processor = Processor::new(
        queue,
        Arc::from(store),
        setup.router,
        setup.recipients,
        dispatcher,
    )
    .with_delays(config.escalation.to_delays());

    processor.restore()?;
    processor.define_checks(setup.definitions);
    Ok(processor)
}
