//! Tag domain type
//!
//! A tag's identifier is its name. The name is validated on construction and
//! can never change afterwards.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A routing label shared by checks and rules
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    id: String,
    name: String,
}

impl Tag {
    /// Create a new tag, using the name as identifier
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTagName` if the name is empty or contains
    /// characters outside `[a-zA-Z0-9-_.|]`
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if !Self::is_valid_name(&name) {
            return Err(DomainError::InvalidTagName(name));
        }
        Ok(Self {
            id: name.clone(),
            name,
        })
    }

    /// Whether a string is an acceptable tag name
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '|'))
    }

    /// Tag identifier (always equal to the name)
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tag name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attempt to change the name
    ///
    /// Only a no-op "rename" to the current name is accepted.
    ///
    /// # Errors
    /// Returns `DomainError::TagRenameRejected` for any other name
    pub fn rename(&mut self, new_name: &str) -> Result<(), DomainError> {
        if new_name == self.name {
            return Ok(());
        }
        Err(DomainError::TagRenameRejected {
            id: self.id.clone(),
            requested: new_name.to_string(),
        })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl TryFrom<String> for Tag {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.name
    }
}
