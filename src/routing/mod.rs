//! Tag and rule routing index
//!
//! A check is routed to a rule when it carries every tag the rule requires.
//! The index keeps both sides of each tag association (tag to checks, tag to
//! rules, check to tags) and caches the resulting routes per check.
//!
//! All mutations go through [`RoutingIndex::apply`], which validates the
//! change, applies it to both sides, and recomputes the routes of every
//! affected check before returning. [`Router`] shares one index between
//! threads and runs each `apply` under its write lock, so lookups never see
//! an association change without the matching routes.

use crate::domain::{Rule, Tag};
use crate::error::DomainError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One (rule, channel) pair applying to a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub rule_id: String,
    pub channel_id: String,
}

/// Compute the routes of a check from its tags
///
/// Routes are ordered by rule id, then by channel order within the rule.
pub fn compute_routes<'a, I>(check_tags: &BTreeSet<String>, rules: I) -> Vec<Route>
where
    I: IntoIterator<Item = &'a Rule>,
{
    let mut matching: Vec<&Rule> = rules
        .into_iter()
        .filter(|rule| rule.matches(check_tags))
        .collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));

    matching
        .into_iter()
        .flat_map(|rule| {
            rule.channels.iter().map(move |channel| Route {
                rule_id: rule.id.clone(),
                channel_id: channel.clone(),
            })
        })
        .collect()
}

/// A single mutation of the routing index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationChange {
    CreateTag(String),
    /// Only a rename to the current name succeeds
    RenameTag { id: String, name: String },
    DeleteTag(String),
    TagCheck { tag: String, check: String },
    UntagCheck { tag: String, check: String },
    TagRule { tag: String, rule: String },
    UntagRule { tag: String, rule: String },
    UpsertRule(Rule),
    RemoveRule(String),
    RegisterCheck(String),
    RemoveCheck(String),
}

/// Checks whose routes changed as the result of an `apply`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteUpdate {
    pub changed: Vec<String>,
}

impl RouteUpdate {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Tag associations and the routes they produce
#[derive(Debug, Default)]
pub struct RoutingIndex {
    tags: BTreeMap<String, Tag>,
    tag_checks: BTreeMap<String, BTreeSet<String>>,
    tag_rules: BTreeMap<String, BTreeSet<String>>,
    check_tags: BTreeMap<String, BTreeSet<String>>,
    rules: BTreeMap<String, Rule>,
    routes: BTreeMap<String, Vec<Route>>,
}

impl RoutingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one change and recompute the affected routes
    ///
    /// # Errors
    /// Returns a `DomainError` when the change is invalid; the index is
    /// left untouched in that case
    pub fn apply(&mut self, change: AssociationChange) -> Result<RouteUpdate, DomainError> {
        let affected = match change {
            AssociationChange::CreateTag(name) => {
                let tag = Tag::new(name)?;
                if self.tags.contains_key(tag.id()) {
                    return Err(DomainError::DuplicateTag(tag.id().to_string()));
                }
                self.tags.insert(tag.id().to_string(), tag);
                BTreeSet::new()
            }

            AssociationChange::RenameTag { id, name } => {
                let tag = self
                    .tags
                    .get_mut(&id)
                    .ok_or_else(|| DomainError::UnknownTag(id.clone()))?;
                tag.rename(&name)?;
                BTreeSet::new()
            }

            AssociationChange::DeleteTag(id) => {
                self.require_tag(&id)?;

                let rule_ids = self.tag_rules.remove(&id).unwrap_or_default();
                let mut affected = self.tag_checks.remove(&id).unwrap_or_default();
                for rule_id in &rule_ids {
                    affected.extend(self.checks_matching(rule_id));
                }

                for tags in self.check_tags.values_mut() {
                    tags.remove(&id);
                }
                for rule_id in &rule_ids {
                    if let Some(rule) = self.rules.get_mut(rule_id) {
                        rule.tags.remove(&id);
                    }
                }
                for rule_id in &rule_ids {
                    affected.extend(self.checks_matching(rule_id));
                }

                self.tags.remove(&id);
                affected
            }

            AssociationChange::TagCheck { tag, check } => {
                self.require_tag(&tag)?;
                self.check_tags
                    .entry(check.clone())
                    .or_default()
                    .insert(tag.clone());
                self.tag_checks.entry(tag).or_default().insert(check.clone());
                BTreeSet::from([check])
            }

            AssociationChange::UntagCheck { tag, check } => {
                self.require_tag(&tag)?;
                self.require_check(&check)?;
                if let Some(tags) = self.check_tags.get_mut(&check) {
                    tags.remove(&tag);
                }
                if let Some(checks) = self.tag_checks.get_mut(&tag) {
                    checks.remove(&check);
                }
                BTreeSet::from([check])
            }

            AssociationChange::TagRule { tag, rule } => {
                self.require_tag(&tag)?;
                self.require_rule(&rule)?;
                let mut affected = self.checks_matching(&rule);
                if let Some(r) = self.rules.get_mut(&rule) {
                    r.tags.insert(tag.clone());
                }
                self.tag_rules.entry(tag).or_default().insert(rule.clone());
                affected.extend(self.checks_matching(&rule));
                affected
            }

            AssociationChange::UntagRule { tag, rule } => {
                self.require_tag(&tag)?;
                self.require_rule(&rule)?;
                let mut affected = self.checks_matching(&rule);
                if let Some(r) = self.rules.get_mut(&rule) {
                    r.tags.remove(&tag);
                }
                if let Some(rules) = self.tag_rules.get_mut(&tag) {
                    rules.remove(&rule);
                }
                affected.extend(self.checks_matching(&rule));
                affected
            }

            AssociationChange::UpsertRule(rule) => {
                if rule.channels.is_empty() {
                    return Err(DomainError::EmptyRuleChannels(rule.id));
                }
                for tag in &rule.tags {
                    self.require_tag(tag)?;
                }

                let mut affected = self.checks_matching(&rule.id);
                self.unlink_rule(&rule.id);
                for tag in &rule.tags {
                    self.tag_rules
                        .entry(tag.clone())
                        .or_default()
                        .insert(rule.id.clone());
                }
                let id = rule.id.clone();
                self.rules.insert(id.clone(), rule);
                affected.extend(self.checks_matching(&id));
                affected
            }

            AssociationChange::RemoveRule(id) => {
                self.require_rule(&id)?;
                let affected = self.checks_matching(&id);
                self.unlink_rule(&id);
                self.rules.remove(&id);
                affected
            }

            AssociationChange::RegisterCheck(id) => {
                if self.check_tags.contains_key(&id) {
                    BTreeSet::new()
                } else {
                    self.check_tags.insert(id.clone(), BTreeSet::new());
                    BTreeSet::from([id])
                }
            }

            AssociationChange::RemoveCheck(id) => {
                self.require_check(&id)?;
                if let Some(tags) = self.check_tags.remove(&id) {
                    for tag in tags {
                        if let Some(checks) = self.tag_checks.get_mut(&tag) {
                            checks.remove(&id);
                        }
                    }
                }
                if self.routes.remove(&id).is_some_and(|r| !r.is_empty()) {
                    return Ok(RouteUpdate { changed: vec![id] });
                }
                BTreeSet::new()
            }
        };

        Ok(self.recompute(affected))
    }

    fn require_tag(&self, id: &str) -> Result<(), DomainError> {
        if self.tags.contains_key(id) {
            Ok(())
        } else {
            Err(DomainError::UnknownTag(id.to_string()))
        }
    }

    fn require_rule(&self, id: &str) -> Result<(), DomainError> {
        if self.rules.contains_key(id) {
            Ok(())
        } else {
            Err(DomainError::UnknownRule(id.to_string()))
        }
    }

    fn require_check(&self, id: &str) -> Result<(), DomainError> {
        if self.check_tags.contains_key(id) {
            Ok(())
        } else {
            Err(DomainError::UnknownCheck(id.to_string()))
        }
    }

    fn unlink_rule(&mut self, id: &str) {
        for rules in self.tag_rules.values_mut() {
            rules.remove(id);
        }
    }

    /// Checks currently matched by a rule
    fn checks_matching(&self, rule_id: &str) -> BTreeSet<String> {
        let Some(rule) = self.rules.get(rule_id) else {
            return BTreeSet::new();
        };

        // Narrow down through the rarest tag's members before testing subsets
        let candidates: Box<dyn Iterator<Item = &String> + '_> = match rule
            .tags
            .iter()
            .filter_map(|t| self.tag_checks.get(t))
            .min_by_key(|checks| checks.len())
        {
            Some(checks) => Box::new(checks.iter()),
            None if rule.tags.is_empty() => Box::new(self.check_tags.keys()),
            None => return BTreeSet::new(),
        };

        candidates
            .filter(|check| {
                self.check_tags
                    .get(check.as_str())
                    .is_some_and(|tags| rule.matches(tags))
            })
            .cloned()
            .collect()
    }

    fn recompute(&mut self, checks: BTreeSet<String>) -> RouteUpdate {
        let mut changed = Vec::new();

        for check in checks {
            let routes = match self.check_tags.get(&check) {
                Some(tags) => compute_routes(tags, self.rules.values()),
                None => Vec::new(),
            };

            let previous = self.routes.get(&check).map(Vec::as_slice).unwrap_or(&[]);
            if previous != routes.as_slice() {
                changed.push(check.clone());
            }
            if self.check_tags.contains_key(&check) {
                self.routes.insert(check, routes);
            } else {
                self.routes.remove(&check);
            }
        }

        RouteUpdate { changed }
    }

    /// Current routes of a check (empty for unknown checks)
    pub fn routes_for(&self, check: &str) -> &[Route] {
        self.routes.get(check).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags_for(&self, check: &str) -> Option<&BTreeSet<String>> {
        self.check_tags.get(check)
    }

    pub fn contains_check(&self, check: &str) -> bool {
        self.check_tags.contains_key(check)
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Known checks in id order
    pub fn checks(&self) -> impl Iterator<Item = &str> {
        self.check_tags.keys().map(String::as_str)
    }
}

/// Shared handle to a routing index
#[derive(Debug, Clone, Default)]
pub struct Router {
    index: Arc<RwLock<RoutingIndex>>,
}

impl Router {
    pub fn new(index: RoutingIndex) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
        }
    }

    /// Apply a change under the write lock
    pub fn apply(&self, change: AssociationChange) -> Result<RouteUpdate, DomainError> {
        log::debug!("Routing change: {:?}", change);
        let update = self.write().apply(change)?;
        if !update.is_empty() {
            log::debug!("Routes changed for {:?}", update.changed);
        }
        Ok(update)
    }

    /// Register a check if the index has not seen it yet
    pub fn ensure_check(&self, check: &str) {
        if self.read().contains_check(check) {
            return;
        }
        // Registration of an unknown check cannot fail
        let _ = self.apply(AssociationChange::RegisterCheck(check.to_string()));
    }

    /// Snapshot of a check's routes
    pub fn routes_for(&self, check: &str) -> Vec<Route> {
        self.read().routes_for(check).to_vec()
    }

    pub fn rule(&self, id: &str) -> Option<Rule> {
        self.read().rule(id).cloned()
    }

    /// Run a closure with read access to the index
    pub fn with_index<R>(&self, f: impl FnOnce(&RoutingIndex) -> R) -> R {
        f(&self.read())
    }

    fn read(&self) -> RwLockReadGuard<'_, RoutingIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoutingIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}
