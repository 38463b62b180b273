//! Notification dispatcher
//!
//! Owns one handler per channel type. In inline mode a payload is delivered
//! on the calling thread and delivery errors are returned. In background mode
//! every handler runs on its own worker thread fed by a channel: `dispatch`
//! only enqueues, and the worker logs delivery failures.

use super::{DispatchMode, Notifier, Payload};
use crate::error::DeliveryError;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

struct Worker {
    sender: mpsc::Sender<Payload>,
    thread: thread::JoinHandle<()>,
}

enum Handler {
    Inline(Box<dyn Notifier>),
    Background(Worker),
}

/// Hands payloads to the handler of their channel type
pub struct Dispatcher {
    mode: DispatchMode,
    handlers: BTreeMap<String, Handler>,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            handlers: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Add (or replace) the handler for the notifier's type
    ///
    /// In background mode this starts the handler's worker thread.
    pub fn add_notifier(&mut self, notifier: Box<dyn Notifier>) -> Result<(), DeliveryError> {
        let kind = notifier.kind().to_string();

        let handler = match self.mode {
            DispatchMode::Inline => Handler::Inline(notifier),
            DispatchMode::Background => Handler::Background(Self::spawn_worker(&kind, notifier)?),
        };

        if let Some(old) = self.handlers.insert(kind.clone(), handler) {
            Self::stop(&kind, old);
        }
        log::debug!("Registered {} delivery handler ({:?})", kind, self.mode);
        Ok(())
    }

    fn spawn_worker(kind: &str, notifier: Box<dyn Notifier>) -> Result<Worker, DeliveryError> {
        let (sender, receiver) = mpsc::channel::<Payload>();

        let thread = thread::Builder::new()
            .name(format!("notify-{}", kind))
            .spawn(move || {
                for payload in receiver {
                    if let Err(e) = notifier.notify(&payload) {
                        log::warn!(
                            "Failed to notify {} via {} for {}: {}",
                            payload.channel_id,
                            notifier.kind(),
                            payload.check_id,
                            e
                        );
                    }
                }
            })?;

        Ok(Worker { sender, thread })
    }

    /// Whether a handler exists for a channel type
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Deliver (inline) or enqueue (background) one payload
    ///
    /// # Errors
    /// Returns `DeliveryError::WorkerGone` if there is no handler for the
    /// payload's type or its worker stopped, and the handler's own error in
    /// inline mode
    pub fn dispatch(&self, payload: Payload) -> Result<(), DeliveryError> {
        match self.handlers.get(&payload.kind) {
            Some(Handler::Inline(notifier)) => notifier.notify(&payload),
            Some(Handler::Background(worker)) => {
                let kind = payload.kind.clone();
                worker
                    .sender
                    .send(payload)
                    .map_err(|_| DeliveryError::WorkerGone(kind))
            }
            None => Err(DeliveryError::WorkerGone(payload.kind)),
        }
    }

    /// Stop all workers after they drained their queues
    pub fn shutdown(&mut self) {
        for (kind, handler) in std::mem::take(&mut self.handlers) {
            Self::stop(&kind, handler);
        }
    }

    fn stop(kind: &str, handler: Handler) {
        if let Handler::Background(worker) = handler {
            drop(worker.sender);
            if worker.thread.join().is_err() {
                log::error!("Delivery worker for {} panicked", kind);
            } else {
                log::debug!("Delivery worker for {} stopped", kind);
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
