//! Routing rule domain types

use crate::error::DomainError;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::Serialize;
use std::collections::BTreeSet;

/// Days and time-of-day during which a rule may notify
///
/// Times are UTC. A window whose start is after its end wraps over midnight
/// and belongs to the day it started on. An empty day set means every day;
/// equal start and end mean the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRestriction {
    days: Vec<Weekday>,
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRestriction {
    /// Create a restriction
    pub fn new(days: Vec<Weekday>, start: NaiveTime, end: NaiveTime) -> Self {
        Self { days, start, end }
    }

    /// Restrict to whole days only
    pub fn days(days: Vec<Weekday>) -> Self {
        Self::new(days, NaiveTime::MIN, NaiveTime::MIN)
    }

    /// Parse a day name like `mon` or `Monday`
    pub fn parse_day(day: &str) -> Result<Weekday, DomainError> {
        day.trim()
            .parse::<Weekday>()
            .map_err(|_| DomainError::InvalidValue(format!("unknown day '{}'", day)))
    }

    /// Parse a time of day like `09:00` or `17:30:00`
    pub fn parse_time(time: &str) -> Result<NaiveTime, DomainError> {
        NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
            .map_err(|_| DomainError::InvalidValue(format!("invalid time of day '{}'", time)))
    }

    fn day_allowed(&self, day: Weekday) -> bool {
        self.days.is_empty() || self.days.contains(&day)
    }

    /// Whether the restriction allows notifications at the given instant
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        let time = at.time();
        let today = at.weekday();

        if self.start == self.end {
            return self.day_allowed(today);
        }

        if self.start < self.end {
            return self.day_allowed(today) && time >= self.start && time < self.end;
        }

        let yesterday = (at - Duration::days(1)).weekday();
        (time >= self.start && self.day_allowed(today))
            || (time < self.end && self.day_allowed(yesterday))
    }
}

/// A tag-based filter binding matching checks to channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Unique rule identifier
    pub id: String,
    /// Tags a check must carry (all of them) to match
    pub tags: BTreeSet<String>,
    /// Channel identifiers to notify, in order
    pub channels: Vec<String>,
    /// Optional notification window
    pub restriction: Option<TimeRestriction>,
}

impl Rule {
    /// Create a rule delivering to the given channels
    ///
    /// # Errors
    /// Returns `DomainError::EmptyRuleChannels` if `channels` is empty
    pub fn new<I, S>(id: impl Into<String>, channels: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let mut seen = BTreeSet::new();
        let channels: Vec<String> = channels
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| seen.insert(c.clone()))
            .collect();

        if channels.is_empty() {
            return Err(DomainError::EmptyRuleChannels(id));
        }

        Ok(Self {
            id,
            tags: BTreeSet::new(),
            channels,
            restriction: None,
        })
    }

    /// Builder: set required tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set time restriction
    pub fn with_restriction(mut self, restriction: TimeRestriction) -> Self {
        self.restriction = Some(restriction);
        self
    }

    /// Whether a check carrying `check_tags` matches this rule
    pub fn matches(&self, check_tags: &BTreeSet<String>) -> bool {
        self.tags.is_subset(check_tags)
    }

    /// Whether the rule may notify at the given instant
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.restriction.as_ref().map_or(true, |r| r.is_active(at))
    }
}
