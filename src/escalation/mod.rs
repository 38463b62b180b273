//! Escalation scheduling
//!
//! Decides, per (check, channel) pair, whether a failing check is due a
//! notification. A failure episode first waits the initial delay; after the
//! first notification, repeats are spaced by at least the repeat delay.
//! Evaluating a pair never advances it: only [`EscalationScheduler::record_dispatch`]
//! does, so a pair whose delivery was skipped stays eligible.

use crate::domain::Channel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default wait before the first notification of an episode
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(30);

/// Default minimum spacing between repeat notifications
pub const DEFAULT_REPEAT_DELAY: Duration = Duration::from_secs(60);

/// Initial and repeat delays applying to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    pub initial: Duration,
    pub repeat: Duration,
}

impl Delays {
    pub fn new(initial: Duration, repeat: Duration) -> Self {
        Self { initial, repeat }
    }

    /// Apply a channel's overrides on top of these defaults
    pub fn for_channel(&self, channel: &Channel) -> Self {
        Self {
            initial: channel.initial_delay.unwrap_or(self.initial),
            repeat: channel.repeat_delay.unwrap_or(self.repeat),
        }
    }
}

impl Default for Delays {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_REPEAT_DELAY)
    }
}

/// Escalation phase of a (check, channel) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for the initial delay to pass
    Armed,
    /// Notified at least once during this episode
    Repeating,
}

/// Per (check, channel) escalation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationState {
    pub check_id: String,
    pub channel_id: String,
    /// Start of the failure episode this state belongs to
    pub episode_start: DateTime<Utc>,
    pub phase: Phase,
    pub last_notified: Option<DateTime<Utc>>,
}

impl NotificationState {
    fn armed(check_id: &str, channel_id: &str, episode_start: DateTime<Utc>) -> Self {
        Self {
            check_id: check_id.to_string(),
            channel_id: channel_id.to_string(),
            episode_start,
            phase: Phase::Armed,
            last_notified: None,
        }
    }
}

fn elapsed(since: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    // Negative spans (clock skew between producers) count as zero
    (at - since).to_std().unwrap_or(Duration::ZERO)
}

/// Escalation state for every notified (check, channel) pair
#[derive(Debug, Default)]
pub struct EscalationScheduler {
    states: BTreeMap<(String, String), NotificationState>,
}

impl EscalationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the pair is due a notification at `at`
    ///
    /// State from an older episode is discarded and the pair re-armed, so a
    /// check that recovered and failed again waits the initial delay again.
    pub fn evaluate(
        &mut self,
        check_id: &str,
        channel_id: &str,
        at: DateTime<Utc>,
        episode_start: DateTime<Utc>,
        delays: Delays,
    ) -> bool {
        let key = (check_id.to_string(), channel_id.to_string());
        let state = self
            .states
            .entry(key)
            .and_modify(|s| {
                if s.episode_start != episode_start {
                    *s = NotificationState::armed(check_id, channel_id, episode_start);
                }
            })
            .or_insert_with(|| NotificationState::armed(check_id, channel_id, episode_start));

        match (state.phase, state.last_notified) {
            (Phase::Repeating, Some(last)) => elapsed(last, at) >= delays.repeat,
            _ => elapsed(state.episode_start, at) >= delays.initial,
        }
    }

    /// Record a delivered notification, moving the pair to repeating
    pub fn record_dispatch(&mut self, check_id: &str, channel_id: &str, at: DateTime<Utc>) {
        let key = (check_id.to_string(), channel_id.to_string());
        let state = self
            .states
            .entry(key)
            .or_insert_with(|| NotificationState::armed(check_id, channel_id, at));
        state.phase = Phase::Repeating;
        state.last_notified = Some(at);
    }

    /// Forget every pair of a check; returns how many were removed
    pub fn clear_check(&mut self, check_id: &str) -> usize {
        let before = self.states.len();
        self.states.retain(|(check, _), _| check != check_id);
        before - self.states.len()
    }

    /// States of one check, ordered by channel id
    pub fn states_for(&self, check_id: &str) -> Vec<NotificationState> {
        self.states
            .values()
            .filter(|s| s.check_id == check_id)
            .cloned()
            .collect()
    }

    pub fn get(&self, check_id: &str, channel_id: &str) -> Option<&NotificationState> {
        self.states
            .get(&(check_id.to_string(), channel_id.to_string()))
    }

    /// Load previously persisted states
    pub fn import<I: IntoIterator<Item = NotificationState>>(&mut self, states: I) {
        for state in states {
            self.states
                .insert((state.check_id.clone(), state.channel_id.clone()), state);
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
