//! Status report consumed from the queue

use super::check::CheckState;
use crate::error::QueueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One status update for a check
///
/// Wire shape: `{"check_id": "...", "state": "critical", "timestamp": "...", "summary": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check identifier
    pub check_id: String,
    /// Reported state
    pub state: CheckState,
    /// When the state was observed
    pub timestamp: DateTime<Utc>,
    /// Free-text summary
    #[serde(default)]
    pub summary: String,
    /// Backend-assigned delivery handle used for acknowledgement
    #[serde(skip)]
    pub receipt: Option<String>,
}

impl CheckResult {
    /// Create a new result without a delivery handle
    pub fn new(
        check_id: impl Into<String>,
        state: CheckState,
        timestamp: DateTime<Utc>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            state,
            timestamp,
            summary: summary.into(),
            receipt: None,
        }
    }

    /// Builder: attach a delivery handle
    pub fn with_receipt(mut self, receipt: impl Into<String>) -> Self {
        self.receipt = Some(receipt.into());
        self
    }

    /// Decode a result from its JSON wire form
    pub fn from_json(bytes: &[u8]) -> Result<Self, QueueError> {
        let result: Self =
            serde_json::from_slice(bytes).map_err(|e| QueueError::Decode(e.to_string()))?;
        if result.check_id.trim().is_empty() {
            return Err(QueueError::Decode("check_id must not be empty".to_string()));
        }
        Ok(result)
    }

    /// Encode the result to its JSON wire form
    pub fn to_json(&self) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(self).map_err(|e| QueueError::Decode(e.to_string()))
    }
}
