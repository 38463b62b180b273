//! Mock implementations for testing
//!
//! Provides recording and failing delivery handlers, a store that can be
//! switched off, and builders for results and payloads.

use crate::config::QueueConfig;
use crate::domain::{Channel, Check, CheckResult, CheckState};
use crate::error::{DeliveryError, QueueError, StoreError};
use crate::escalation::NotificationState;
use crate::notify::{Notifier, Payload};
use crate::queue::{MemoryQueue, QueueBackend, QueueRegistry};
use crate::store::{MemoryStore, Snapshot, StateStore};

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Fixed reference instant used across tests (a Monday)
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Result for a check `secs` seconds after [`t0`]
pub fn result_at(check_id: &str, state: CheckState, secs: i64) -> CheckResult {
    CheckResult::new(
        check_id,
        state,
        t0() + Duration::seconds(secs),
        format!("{} at +{}s", state.as_str(), secs),
    )
}

/// Payload for a check routed to a channel of the given type
pub fn payload(check_id: &str, kind: &str) -> Payload {
    let channel = Channel::new(format!("{}-channel", kind), "ops", kind, "ops@example.com");
    Payload::new(
        &result_at(check_id, CheckState::Critical, 0),
        &channel,
        "mock-rule",
    )
}

/// Built-in registry plus a `memory` backend, for configuration-driven tests
pub fn memory_registry() -> QueueRegistry {
    fn build_memory(config: &QueueConfig) -> Result<Box<dyn QueueBackend>, QueueError> {
        Ok(Box::new(MemoryQueue::new(&config.queue_name)))
    }

    let mut registry = QueueRegistry::with_builtin();
    registry.register("memory", build_memory);
    registry
}

/// Notifier that records every payload it receives
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    kind: String,
    delivered: Arc<Mutex<Vec<Payload>>>,
}

impl RecordingNotifier {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Payloads delivered so far, in order
    pub fn delivered(&self) -> Vec<Payload> {
        self.delivered.lock().unwrap().clone()
    }

    /// Delivered payloads for one channel
    pub fn delivered_to(&self, channel_id: &str) -> Vec<Payload> {
        self.delivered()
            .into_iter()
            .filter(|p| p.channel_id == channel_id)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, payload: &Payload) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(payload.clone());
        Ok(())
    }

    fn kind(&self) -> &str {
        &self.kind
    }
}

/// Notifier that always fails
#[derive(Debug, Clone)]
pub struct FailingNotifier {
    kind: String,
}

impl FailingNotifier {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl Notifier for FailingNotifier {
    fn notify(&self, payload: &Payload) -> Result<(), DeliveryError> {
        Err(DeliveryError::Failed {
            kind: self.kind.clone(),
            address: payload.address.clone(),
            message: "mock delivery failure".to_string(),
        })
    }

    fn kind(&self) -> &str {
        &self.kind
    }
}

/// Memory store whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    unavailable: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl StateStore for FlakyStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        self.inner.load()
    }

    fn persist(&self, check: &Check, states: &[NotificationState]) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mock store is down".to_string()));
        }
        self.inner.persist(check, states)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_shares_state() {
        let recorder = RecordingNotifier::new("email");
        let clone = recorder.clone();

        clone.notify(&payload("db01:disk", "email")).unwrap();
        assert_eq!(recorder.delivered().len(), 1);
        assert_eq!(recorder.delivered_to("email-channel").len(), 1);
    }

    #[test]
    fn test_failing_notifier() {
        let notifier = FailingNotifier::new("email");
        assert!(notifier.notify(&payload("db01:disk", "email")).is_err());
    }

    #[test]
    fn test_flaky_store() {
        let store = FlakyStore::new();
        store.persist(&Check::new("a"), &[]).unwrap();

        store.set_unavailable(true);
        assert!(store.persist(&Check::new("a"), &[]).is_err());
        assert_eq!(store.inner().write_count(), 1);
    }

    #[test]
    fn test_result_at() {
        let result = result_at("c", CheckState::Warning, 35);
        assert_eq!(result.timestamp, t0() + Duration::seconds(35));
        assert_eq!(result.summary, "warning at +35s");
    }
}
