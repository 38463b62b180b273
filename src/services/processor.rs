//! Result processing loop
//!
//! Consumes results one at a time and, for each, strictly in order:
//! ingests it, decides whether notifications are suppressed, dispatches the
//! eligible (check, channel) pairs, persists the check and its notification
//! state, and only then acknowledges the result. A result whose processing
//! fails before persistence stays on the queue and is delivered again.

use crate::domain::{Check, CheckResult, CheckState, Ingest, Recipients};
use crate::error::{AppError, QueueError, StoreError};
use crate::escalation::{Delays, EscalationScheduler};
use crate::notify::{Dispatcher, Payload};
use crate::queue::QueueBackend;
use crate::routing::Router;
use crate::store::StateStore;
use crate::tracker::CheckTracker;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a result produced no notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    /// Not newer than the last result for the check
    Replay,
    /// The check is ok
    Ok,
    /// A maintenance window covers the result timestamp
    Maintenance,
    /// These direct parents are failing
    ParentFailed(Vec<String>),
}

/// A delivery that was attempted and failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub channel_id: String,
    pub message: String,
}

/// What processing one result did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub check_id: String,
    pub ingest: Ingest,
    pub suppressed: Option<Suppression>,
    /// Channels handed a notification, in route order
    pub dispatched: Vec<String>,
    pub failures: Vec<DeliveryFailure>,
}

impl ProcessOutcome {
    fn new(check_id: &str, ingest: Ingest) -> Self {
        Self {
            check_id: check_id.to_string(),
            ingest,
            suppressed: None,
            dispatched: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Sequential consumer of one queue
pub struct Processor<Q: QueueBackend> {
    queue: Q,
    tracker: CheckTracker,
    scheduler: EscalationScheduler,
    router: Router,
    recipients: Recipients,
    dispatcher: Dispatcher,
    store: Arc<dyn StateStore>,
    delays: Delays,
}

impl<Q: QueueBackend> Processor<Q> {
    /// Create a processor with default escalation delays
    pub fn new(
        queue: Q,
        store: Arc<dyn StateStore>,
        router: Router,
        recipients: Recipients,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            queue,
            tracker: CheckTracker::new(),
            scheduler: EscalationScheduler::new(),
            router,
            recipients,
            dispatcher,
            store,
            delays: Delays::default(),
        }
    }

    /// Builder: set default escalation delays
    pub fn with_delays(mut self, delays: Delays) -> Self {
        self.delays = delays;
        self
    }

    /// Load persisted checks and notification states from the store
    ///
    /// Returns the number of restored checks.
    pub fn restore(&mut self) -> Result<usize, StoreError> {
        let snapshot = self.store.load()?;
        let count = snapshot.checks.len();

        self.scheduler
            .import(snapshot.notification_states().cloned());
        for check in snapshot.checks.into_values() {
            self.tracker.restore(check);
        }

        log::info!(
            "Restored {} checks and {} notification states from the {} store",
            count,
            self.scheduler.len(),
            self.store.name()
        );
        Ok(count)
    }

    /// Apply configured check definitions (parents, maintenance windows)
    pub fn define_checks<I: IntoIterator<Item = Check>>(&mut self, definitions: I) {
        for definition in definitions {
            self.router.ensure_check(&definition.id);
            self.tracker.define(definition);
        }
    }

    pub fn tracker(&self) -> &CheckTracker {
        &self.tracker
    }

    /// Mutable access for maintenance operations
    pub fn tracker_mut(&mut self) -> &mut CheckTracker {
        &mut self.tracker
    }

    pub fn scheduler(&self) -> &EscalationScheduler {
        &self.scheduler
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Fetch, process and acknowledge one result
    ///
    /// # Errors
    /// Queue and store errors propagate; the result is not acknowledged when
    /// persisting it failed
    pub fn process_next(&mut self) -> Result<ProcessOutcome, AppError> {
        log::debug!("Waiting for result from the {} queue", self.queue.name());
        let result = self.queue.next()?;

        let outcome = self.process(&result)?;

        self.queue.delete(&result)?;
        log::debug!("Acknowledged result for {}", result.check_id);
        Ok(outcome)
    }

    /// Process results until `stop` is set or the queue closes
    ///
    /// The flag is checked between results only. Returns the number of
    /// processed results.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<usize, AppError> {
        log::info!("Processing results from the {} queue", self.queue.name());
        let mut processed = 0;

        while !stop.load(Ordering::SeqCst) {
            match self.process_next() {
                Ok(_) => processed += 1,
                Err(AppError::Queue(QueueError::Closed(name))) => {
                    log::info!("Queue {} closed", name);
                    break;
                }
                Err(e) => {
                    log::error!("Processing failed: {}", e);
                    return Err(e);
                }
            }
        }

        log::info!("Stopped after {} results", processed);
        Ok(processed)
    }

    /// Stop delivery workers after they drained their queues
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
    }

    /// Run one result through ingest, suppression, dispatch and persistence
    pub fn process(&mut self, result: &CheckResult) -> Result<ProcessOutcome, AppError> {
        log::info!(
            "Processing result for check {} ({} at {})",
            result.check_id,
            result.state,
            result.timestamp
        );

        let ingest = self.tracker.ingest(result);
        self.router.ensure_check(&result.check_id);
        let mut outcome = ProcessOutcome::new(&result.check_id, ingest);

        match self.suppression(result, ingest) {
            Some(reason) => {
                log::info!("Notifications for {} suppressed: {:?}", result.check_id, reason);
                outcome.suppressed = Some(reason);
            }
            None => self.dispatch(result, &mut outcome),
        }

        self.tracker
            .prune_maintenance(&result.check_id, result.timestamp);
        self.persist(&result.check_id)?;
        Ok(outcome)
    }

    fn suppression(&mut self, result: &CheckResult, ingest: Ingest) -> Option<Suppression> {
        if ingest.replay {
            return Some(Suppression::Replay);
        }

        if result.state == CheckState::Ok {
            let cleared = self.scheduler.clear_check(&result.check_id);
            if ingest.is_recovery() {
                log::info!(
                    "Check {} recovered, cleared {} notification states",
                    result.check_id,
                    cleared
                );
            }
            return Some(Suppression::Ok);
        }

        if self.tracker.in_maintenance(&result.check_id, result.timestamp) {
            return Some(Suppression::Maintenance);
        }

        let failed = self.tracker.failed_parents(&result.check_id);
        if !failed.is_empty() {
            return Some(Suppression::ParentFailed(
                failed.into_iter().map(String::from).collect(),
            ));
        }

        None
    }

    fn dispatch(&mut self, result: &CheckResult, outcome: &mut ProcessOutcome) {
        let check_id = result.check_id.as_str();
        let Some(episode_start) = self.tracker.get(check_id).and_then(|c| c.failing_since) else {
            return;
        };

        // Routes paired with whether their rule may notify at the result time
        let routes: Vec<_> = self.router.with_index(|index| {
            index
                .routes_for(check_id)
                .iter()
                .map(|route| {
                    let active = index
                        .rule(&route.rule_id)
                        .is_some_and(|rule| rule.is_active(result.timestamp));
                    (route.clone(), active)
                })
                .collect()
        });

        if routes.is_empty() {
            log::debug!("No routes for {}", check_id);
            return;
        }

        let mut handled = BTreeSet::new();
        for (route, active) in routes {
            if handled.contains(&route.channel_id) {
                continue;
            }
            if !active {
                log::debug!(
                    "Rule {} is outside its time restriction for {}",
                    route.rule_id,
                    route.channel_id
                );
                continue;
            }
            handled.insert(route.channel_id.clone());

            let Some(channel) = self.recipients.channel(&route.channel_id) else {
                log::warn!(
                    "Rule {} references unknown channel {}",
                    route.rule_id,
                    route.channel_id
                );
                continue;
            };

            if !self.dispatcher.handles(&channel.kind) {
                log::debug!(
                    "Skipping channel {}: no {} delivery handler",
                    channel.id,
                    channel.kind
                );
                continue;
            }

            let delays = self.delays.for_channel(channel);
            if !self.scheduler.evaluate(
                check_id,
                &channel.id,
                result.timestamp,
                episode_start,
                delays,
            ) {
                log::debug!("Channel {} not yet due for {}", channel.id, check_id);
                continue;
            }

            match self
                .dispatcher
                .dispatch(Payload::new(result, channel, &route.rule_id))
            {
                Ok(()) => {
                    self.scheduler
                        .record_dispatch(check_id, &channel.id, result.timestamp);
                    log::info!(
                        "Notified {} ({} {}) about {} via rule {}",
                        channel.id,
                        channel.kind,
                        channel.address,
                        check_id,
                        route.rule_id
                    );
                    outcome.dispatched.push(channel.id.clone());
                }
                Err(e) => {
                    log::warn!("Failed to notify {} about {}: {}", channel.id, check_id, e);
                    outcome.failures.push(DeliveryFailure {
                        channel_id: channel.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    fn persist(&self, check_id: &str) -> Result<(), StoreError> {
        let Some(check) = self.tracker.get(check_id) else {
            return Ok(());
        };

        let states = self.scheduler.states_for(check_id);
        self.store.persist(check, &states)?;
        log::debug!(
            "Persisted {} with {} notification states",
            check_id,
            states.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Channel, Contact, Rule, TimeRestriction};
    use crate::mock::{result_at, t0, FailingNotifier, FlakyStore, RecordingNotifier};
    use crate::notify::DispatchMode;
    use crate::queue::{MemoryQueue, MemoryQueueHandle};
    use crate::routing::AssociationChange;
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveTime};

    struct Fixture {
        processor: Processor<MemoryQueue>,
        queue: MemoryQueueHandle,
        email: RecordingNotifier,
        store: Arc<MemoryStore>,
    }

    fn recipients() -> Recipients {
        Recipients::new(vec![Contact {
            id: "ops".to_string(),
            name: "Operations".to_string(),
            channels: vec![
                Channel::new("mail", "ops", "email", "ops@example.com"),
                Channel::new("pager", "ops", "sms", "+15550100"),
            ],
        }])
        .unwrap()
    }

    fn router() -> Router {
        let router = Router::default();
        router
            .apply(AssociationChange::CreateTag("disk".to_string()))
            .unwrap();
        router
            .apply(AssociationChange::TagCheck {
                tag: "disk".to_string(),
                check: "db01:disk".to_string(),
            })
            .unwrap();
        router
            .apply(AssociationChange::UpsertRule(
                Rule::new("disk", ["mail", "pager"])
                    .unwrap()
                    .with_tags(["disk"]),
            ))
            .unwrap();
        router
    }

    fn fixture() -> Fixture {
        let queue = MemoryQueue::new("results");
        let handle = queue.handle();
        let email = RecordingNotifier::new("email");
        let store = Arc::new(MemoryStore::new());

        let mut dispatcher = Dispatcher::new(DispatchMode::Inline);
        dispatcher.add_notifier(Box::new(email.clone())).unwrap();

        let processor = Processor::new(queue, store.clone(), router(), recipients(), dispatcher);
        Fixture {
            processor,
            queue: handle,
            email,
            store,
        }
    }

    /// Processor with immediate delays over the given rules, delivering
    /// `email` and `sms` through recorders
    fn immediate(rules: Vec<Rule>) -> (Processor<MemoryQueue>, MemoryQueueHandle, RecordingNotifier) {
        let router = Router::default();
        router
            .apply(AssociationChange::CreateTag("disk".to_string()))
            .unwrap();
        router
            .apply(AssociationChange::TagCheck {
                tag: "disk".to_string(),
                check: "db01:disk".to_string(),
            })
            .unwrap();
        for rule in rules {
            router.apply(AssociationChange::UpsertRule(rule)).unwrap();
        }

        let email = RecordingNotifier::new("email");
        let mut dispatcher = Dispatcher::new(DispatchMode::Inline);
        dispatcher.add_notifier(Box::new(email.clone())).unwrap();
        dispatcher
            .add_notifier(Box::new(RecordingNotifier::new("sms")))
            .unwrap();

        let queue = MemoryQueue::new("results");
        let handle = queue.handle();
        let processor = Processor::new(
            queue,
            Arc::new(MemoryStore::new()),
            router,
            recipients(),
            dispatcher,
        )
        .with_delays(Delays::new(std::time::Duration::ZERO, std::time::Duration::ZERO));
        (processor, handle, email)
    }

    fn office_hours() -> TimeRestriction {
        TimeRestriction::new(
            Vec::new(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
    }

    fn process(f: &mut Fixture, state: CheckState, secs: i64) -> ProcessOutcome {
        f.queue.push(result_at("db01:disk", state, secs));
        f.processor.process_next().unwrap()
    }

    #[test]
    fn test_escalation_timeline() {
        let mut f = fixture();

        assert!(process(&mut f, CheckState::Critical, 0).dispatched.is_empty());
        assert_eq!(process(&mut f, CheckState::Critical, 35).dispatched, vec!["mail"]);
        assert!(process(&mut f, CheckState::Critical, 50).dispatched.is_empty());
        assert_eq!(process(&mut f, CheckState::Critical, 100).dispatched, vec!["mail"]);

        assert_eq!(f.email.delivered().len(), 2);
        assert_eq!(f.queue.acknowledged_count(), 4);
    }

    #[test]
    fn test_channel_without_handler_is_skipped() {
        let mut f = fixture();
        process(&mut f, CheckState::Critical, 0);
        let outcome = process(&mut f, CheckState::Critical, 40);

        assert_eq!(outcome.dispatched, vec!["mail"]);
        assert!(f.processor.scheduler().get("db01:disk", "pager").is_none());
    }

    #[test]
    fn test_recovery_resets_escalation() {
        let mut f = fixture();
        process(&mut f, CheckState::Critical, 0);
        assert_eq!(process(&mut f, CheckState::Critical, 35).dispatched.len(), 1);

        let ok = process(&mut f, CheckState::Ok, 40);
        assert_eq!(ok.suppressed, Some(Suppression::Ok));
        assert!(ok.ingest.is_recovery());
        assert!(f.processor.scheduler().states_for("db01:disk").is_empty());

        assert!(process(&mut f, CheckState::Critical, 41).dispatched.is_empty());
        assert!(process(&mut f, CheckState::Critical, 70).dispatched.is_empty());
        assert_eq!(process(&mut f, CheckState::Critical, 71).dispatched.len(), 1);
    }

    #[test]
    fn test_replay_is_acknowledged_without_effect() {
        let mut f = fixture();
        process(&mut f, CheckState::Critical, 10);

        let replay = process(&mut f, CheckState::Ok, 10);
        assert_eq!(replay.suppressed, Some(Suppression::Replay));
        assert_eq!(
            f.processor.tracker().get("db01:disk").unwrap().state,
            Some(CheckState::Critical)
        );
        assert_eq!(f.queue.acknowledged_count(), 2);
    }

    #[test]
    fn test_maintenance_suppresses() {
        let mut f = fixture();
        f.processor
            .tracker_mut()
            .add_scheduled_maintenance("db01:disk", t0(), t0() + Duration::hours(1), None)
            .unwrap();

        let outcome = process(&mut f, CheckState::Critical, 60);
        assert_eq!(outcome.suppressed, Some(Suppression::Maintenance));
        assert_eq!(
            f.store.check("db01:disk").unwrap().state,
            Some(CheckState::Critical)
        );
        assert!(f.email.delivered().is_empty());
    }

    #[test]
    fn test_parent_failure_suppresses() {
        let mut f = fixture();
        f.processor
            .define_checks([Check::new("db01:disk").with_parents(["db01:ping"])]);
        f.queue
            .push(result_at("db01:ping", CheckState::Critical, 0));
        f.processor.process_next().unwrap();

        let outcome = process(&mut f, CheckState::Critical, 60);
        assert_eq!(
            outcome.suppressed,
            Some(Suppression::ParentFailed(vec!["db01:ping".to_string()]))
        );
    }

    #[test]
    fn test_delivery_failure_still_persists_and_acknowledges() {
        let queue = MemoryQueue::new("results");
        let handle = queue.handle();
        let store = Arc::new(MemoryStore::new());
        let mut dispatcher = Dispatcher::new(DispatchMode::Inline);
        dispatcher
            .add_notifier(Box::new(FailingNotifier::new("email")))
            .unwrap();
        let mut processor = Processor::new(queue, store.clone(), router(), recipients(), dispatcher)
            .with_delays(Delays::new(std::time::Duration::ZERO, std::time::Duration::ZERO));

        handle.push(result_at("db01:disk", CheckState::Critical, 0));
        let outcome = processor.process_next().unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].channel_id, "mail");
        assert_eq!(store.write_count(), 1);
        assert_eq!(handle.acknowledged_count(), 1);
    }

    #[test]
    fn test_failing_channel_does_not_block_others() {
        let queue = MemoryQueue::new("results");
        let handle = queue.handle();
        let store = Arc::new(MemoryStore::new());
        let sms = RecordingNotifier::new("sms");
        let mut dispatcher = Dispatcher::new(DispatchMode::Inline);
        dispatcher
            .add_notifier(Box::new(FailingNotifier::new("email")))
            .unwrap();
        dispatcher.add_notifier(Box::new(sms.clone())).unwrap();
        let mut processor = Processor::new(queue, store.clone(), router(), recipients(), dispatcher)
            .with_delays(Delays::new(std::time::Duration::ZERO, std::time::Duration::ZERO));

        handle.push(result_at("db01:disk", CheckState::Critical, 0));
        let outcome = processor.process_next().unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].channel_id, "mail");
        assert_eq!(outcome.dispatched, vec!["pager"]);
        assert_eq!(sms.delivered_to("pager").len(), 1);
        assert!(processor.scheduler().get("db01:disk", "mail").is_some());
        assert!(processor
            .scheduler()
            .get("db01:disk", "pager")
            .and_then(|s| s.last_notified)
            .is_some());
        assert_eq!(store.write_count(), 1);
        assert_eq!(handle.acknowledged_count(), 1);
    }

    #[test]
    fn test_restricted_rule_outside_window_skips_eligibility() {
        let rule = Rule::new("business-hours", ["mail"])
            .unwrap()
            .with_tags(["disk"])
            .with_restriction(office_hours());
        let (mut processor, handle, email) = immediate(vec![rule]);

        // t0 is midnight
        handle.push(result_at("db01:disk", CheckState::Critical, 0));
        let outcome = processor.process_next().unwrap();

        assert!(outcome.dispatched.is_empty());
        assert!(outcome.failures.is_empty());
        assert!(processor.scheduler().get("db01:disk", "mail").is_none());
        assert!(email.delivered().is_empty());
    }

    #[test]
    fn test_restricted_rule_delivers_inside_window() {
        let rule = Rule::new("business-hours", ["mail"])
            .unwrap()
            .with_tags(["disk"])
            .with_restriction(office_hours());
        let (mut processor, handle, email) = immediate(vec![rule]);

        handle.push(result_at("db01:disk", CheckState::Critical, 0));
        assert!(processor.process_next().unwrap().dispatched.is_empty());

        handle.push(result_at("db01:disk", CheckState::Critical, 9 * 3600));
        let outcome = processor.process_next().unwrap();
        assert_eq!(outcome.dispatched, vec!["mail"]);
        assert_eq!(email.delivered()[0].rule_id, "business-hours");
    }

    #[test]
    fn test_restricted_rule_does_not_claim_channel() {
        // "business-hours" sorts first, so its inactive route comes before
        // the unrestricted one for the same channel
        let restricted = Rule::new("business-hours", ["mail"])
            .unwrap()
            .with_tags(["disk"])
            .with_restriction(office_hours());
        let always = Rule::new("disk", ["mail"]).unwrap().with_tags(["disk"]);
        let (mut processor, handle, email) = immediate(vec![restricted, always]);

        handle.push(result_at("db01:disk", CheckState::Critical, 0));
        let outcome = processor.process_next().unwrap();

        assert_eq!(outcome.dispatched, vec!["mail"]);
        let delivered = email.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].rule_id, "disk");
    }

    #[test]
    fn test_store_failure_leaves_result_unacknowledged() {
        let queue = MemoryQueue::new("results");
        let handle = queue.handle();
        let store = Arc::new(FlakyStore::new());
        store.set_unavailable(true);
        let mut processor = Processor::new(
            queue,
            store.clone(),
            router(),
            recipients(),
            Dispatcher::new(DispatchMode::Inline),
        );

        handle.push(result_at("db01:disk", CheckState::Warning, 0));
        assert!(matches!(
            processor.process_next(),
            Err(AppError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(handle.acknowledged_count(), 0);
        assert_eq!(handle.in_flight_count(), 1);
    }

    #[test]
    fn test_restore_from_store() {
        let mut f = fixture();
        process(&mut f, CheckState::Critical, 0);
        process(&mut f, CheckState::Critical, 35);

        let queue = MemoryQueue::new("results");
        let handle = queue.handle();
        let email = RecordingNotifier::new("email");
        let mut dispatcher = Dispatcher::new(DispatchMode::Inline);
        dispatcher.add_notifier(Box::new(email.clone())).unwrap();
        let mut restarted =
            Processor::new(queue, f.store.clone(), router(), recipients(), dispatcher);
        assert_eq!(restarted.restore().unwrap(), 1);

        handle.push(result_at("db01:disk", CheckState::Critical, 50));
        assert!(restarted.process_next().unwrap().dispatched.is_empty());
        handle.push(result_at("db01:disk", CheckState::Critical, 95));
        assert_eq!(restarted.process_next().unwrap().dispatched, vec!["mail"]);
    }

    #[test]
    fn test_run_stops_when_queue_closes() {
        let mut f = fixture();
        f.queue.push(result_at("db01:disk", CheckState::Warning, 0));
        f.queue.push(result_at("db01:disk", CheckState::Warning, 1));
        f.queue.close();

        let stop = AtomicBool::new(false);
        assert_eq!(f.processor.run(&stop).unwrap(), 2);
    }

    #[test]
    fn test_run_honours_stop_flag() {
        let mut f = fixture();
        f.queue.push(result_at("db01:disk", CheckState::Warning, 0));

        let stop = AtomicBool::new(true);
        assert_eq!(f.processor.run(&stop).unwrap(), 0);
        assert_eq!(f.queue.pending_count(), 1);
    }
}
