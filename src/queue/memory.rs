//! In-memory queue backend
//!
//! A FIFO shared between a producer [`MemoryQueueHandle`] and the consuming
//! [`MemoryQueue`]. `next()` blocks on a condition variable until a result is
//! pushed or the queue is closed.
//!
//! Fetched results stay in flight until deleted; [`MemoryQueueHandle::redeliver`]
//! puts unacknowledged results back at the front, which is how tests simulate
//! a consumer crash.

use super::QueueBackend;
use crate::domain::CheckResult;
use crate::error::QueueError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<CheckResult>,
    in_flight: HashMap<String, CheckResult>,
    acknowledged: usize,
    next_receipt: u64,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    inner: Mutex<Inner>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Consuming side of the in-memory queue
#[derive(Debug)]
pub struct MemoryQueue {
    shared: Arc<Shared>,
    queue_name: String,
}

/// Producing side of the in-memory queue
#[derive(Debug, Clone)]
pub struct MemoryQueueHandle {
    shared: Arc<Shared>,
}

impl MemoryQueue {
    /// Create an empty queue
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            queue_name: queue_name.into(),
        }
    }

    /// Get a producer handle
    pub fn handle(&self) -> MemoryQueueHandle {
        MemoryQueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queue name
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl QueueBackend for MemoryQueue {
    fn next(&mut self) -> Result<CheckResult, QueueError> {
        let mut inner = self.shared.lock();
        loop {
            if let Some(result) = inner.pending.pop_front() {
                inner.next_receipt += 1;
                let receipt = format!("mem-{}", inner.next_receipt);
                let result = result.with_receipt(receipt.clone());
                inner.in_flight.insert(receipt, result.clone());
                return Ok(result);
            }

            if inner.closed {
                return Err(QueueError::Closed(self.queue_name.clone()));
            }

            inner = self
                .shared
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn delete(&mut self, result: &CheckResult) -> Result<(), QueueError> {
        let receipt = result.receipt.as_deref().ok_or_else(|| {
            QueueError::Decode(format!(
                "result for '{}' was not delivered by this queue",
                result.check_id
            ))
        })?;

        let mut inner = self.shared.lock();
        if inner.in_flight.remove(receipt).is_some() {
            inner.acknowledged += 1;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl MemoryQueueHandle {
    /// Push a result and wake the consumer
    pub fn push(&self, result: CheckResult) {
        let mut inner = self.shared.lock();
        inner.pending.push_back(result);
        self.shared.available.notify_one();
    }

    /// Close the queue; `next()` fails with `QueueError::Closed` once drained
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.available.notify_all();
    }

    /// Put every unacknowledged result back at the front of the queue
    pub fn redeliver(&self) -> usize {
        let mut inner = self.shared.lock();
        let mut in_flight: Vec<(String, CheckResult)> = inner.in_flight.drain().collect();
        in_flight.sort_by(|a, b| receipt_number(&b.0).cmp(&receipt_number(&a.0)));

        let count = in_flight.len();
        for (_, mut result) in in_flight {
            result.receipt = None;
            inner.pending.push_front(result);
        }
        self.shared.available.notify_all();
        count
    }

    /// Number of results waiting to be fetched
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Number of fetched but unacknowledged results
    pub fn in_flight_count(&self) -> usize {
        self.shared.lock().in_flight.len()
    }

    /// Number of results acknowledged so far
    pub fn acknowledged_count(&self) -> usize {
        self.shared.lock().acknowledged
    }
}

fn receipt_number(receipt: &str) -> u64 {
    receipt
        .strip_prefix("mem-")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}
