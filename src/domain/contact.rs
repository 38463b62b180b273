//! Contacts and their delivery channels

use crate::error::DomainError;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// A configured delivery destination ("medium")
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// Unique channel identifier
    pub id: String,
    /// Owning contact
    pub contact_id: String,
    /// Delivery type key, e.g. `email` or `terminal`
    pub kind: String,
    /// Destination address, meaning depends on `kind`
    pub address: String,
    /// Override of the initial notification delay
    pub initial_delay: Option<Duration>,
    /// Override of the repeat notification delay
    pub repeat_delay: Option<Duration>,
}

impl Channel {
    /// Create a channel without delay overrides
    pub fn new(
        id: impl Into<String>,
        contact_id: impl Into<String>,
        kind: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            contact_id: contact_id.into(),
            kind: kind.into(),
            address: address.into(),
            initial_delay: None,
            repeat_delay: None,
        }
    }

    /// Builder: override the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Builder: override the repeat delay
    pub fn with_repeat_delay(mut self, delay: Duration) -> Self {
        self.repeat_delay = Some(delay);
        self
    }
}

/// A person or team owning channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Unique contact identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Owned channels
    pub channels: Vec<Channel>,
}

/// Lookup of all configured contacts and channels
#[derive(Debug, Clone, Default)]
pub struct Recipients {
    contacts: Vec<Contact>,
    channels: HashMap<String, Channel>,
}

impl Recipients {
    /// Index contacts by channel id
    ///
    /// # Errors
    /// Returns `DomainError::InvalidValue` if two channels share an id or a
    /// channel's owner does not match its contact
    pub fn new(contacts: Vec<Contact>) -> Result<Self, DomainError> {
        let mut channels = HashMap::new();

        for contact in &contacts {
            for channel in &contact.channels {
                if channel.contact_id != contact.id {
                    return Err(DomainError::InvalidValue(format!(
                        "channel '{}' is listed under contact '{}' but owned by '{}'",
                        channel.id, contact.id, channel.contact_id
                    )));
                }
                if channels.insert(channel.id.clone(), channel.clone()).is_some() {
                    return Err(DomainError::InvalidValue(format!(
                        "duplicate channel id '{}'",
                        channel.id
                    )));
                }
            }
        }

        Ok(Self { contacts, channels })
    }

    /// Look up a channel by id
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    /// All contacts
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Number of channels across all contacts
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Distinct channel type keys in use
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.channels.values().map(|c| c.kind.as_str()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops() -> Contact {
        Contact {
            id: "ops".to_string(),
            name: "Ops Team".to_string(),
            channels: vec![
                Channel::new("ops-email", "ops", "email", "ops@example.com"),
                Channel::new("ops-sms", "ops", "sms", "+15550100")
                    .with_repeat_delay(Duration::from_secs(300)),
            ],
        }
    }

    #[test]
    fn test_channel_lookup() {
        let recipients = Recipients::new(vec![ops()]).unwrap();
        assert_eq!(recipients.channel_count(), 2);

        let sms = recipients.channel("ops-sms").unwrap();
        assert_eq!(sms.kind, "sms");
        assert_eq!(sms.repeat_delay, Some(Duration::from_secs(300)));
        assert!(recipients.channel("missing").is_none());
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut other = ops();
        other.id = "other".to_string();
        for channel in &mut other.channels {
            channel.contact_id = "other".to_string();
        }
        assert!(Recipients::new(vec![ops(), other]).is_err());
    }

    #[test]
    fn test_owner_mismatch_rejected() {
        let mut contact = ops();
        contact.channels[0].contact_id = "someone-else".to_string();
        assert!(Recipients::new(vec![contact]).is_err());
    }

    #[test]
    fn test_kinds() {
        let recipients = Recipients::new(vec![ops()]).unwrap();
        assert_eq!(recipients.kinds(), vec!["email", "sms"]);
    }
}
