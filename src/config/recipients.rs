//! Recipients loading
//!
//! Contacts come from an optional TOML file (`[[contacts]]` entries) and from
//! the inline `[[recipients.list]]` entries, file entries first.

use crate::config::{ChannelConfig, ContactConfig, RecipientsConfig};
use crate::domain::{Channel, Contact, Recipients};
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RecipientsFile {
    #[serde(default)]
    contacts: Vec<ContactConfig>,
}

/// Build the recipients lookup from configuration
///
/// # Errors
/// Returns `ConfigError::FileNotFound` if the recipients file is missing,
/// `ConfigError::ReadError` if it exists but cannot be read as UTF-8 text,
/// `ConfigError::ParseError` if it does not parse, and
/// `ConfigError::InvalidValue` if channel ids collide across contacts
pub fn load_recipients(config: &RecipientsConfig) -> Result<Recipients, ConfigError> {
    let mut entries = match &config.filename {
        Some(path) => read_file(path)?,
        None => Vec::new(),
    };
    entries.extend(config.list.iter().cloned());

    let contacts = entries.iter().map(ContactConfig::to_contact).collect();
    Recipients::new(contacts).map_err(|e| ConfigError::InvalidValue {
        key: "recipients".to_string(),
        message: e.to_string(),
    })
}

fn read_file(path: &Path) -> Result<Vec<ContactConfig>, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::from_read(path, e))?;
    let file: RecipientsFile = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    log::debug!(
        "Read {} contacts from {}",
        file.contacts.len(),
        path.display()
    );
    Ok(file.contacts)
}

impl ContactConfig {
    /// Convert to a Contact with its channels
    pub fn to_contact(&self) -> Contact {
        Contact {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            channels: self
                .channels
                .iter()
                .map(|c| c.to_channel(&self.id))
                .collect(),
        }
    }
}

impl ChannelConfig {
    /// Convert to a Channel owned by the given contact
    pub fn to_channel(&self, contact_id: &str) -> Channel {
        let mut channel = Channel::new(&self.id, contact_id, &self.kind, &self.address);
        if let Some(secs) = self.initial_delay_secs {
            channel = channel.with_initial_delay(Duration::from_secs(secs));
        }
        if let Some(secs) = self.repeat_delay_secs {
            channel = channel.with_repeat_delay(Duration::from_secs(secs));
        }
        channel
    }
}
