//! Queue backend abstraction
//!
//! The processing loop consumes results through the [`QueueBackend`] trait:
//! a blocking `next()` and an idempotent `delete()` acknowledgement.
//! Results that are fetched but never deleted are re-delivered by the
//! backend, so consumers must tolerate duplicates.
//!
//! Concrete backends are selected by the `[queue] type` configuration key
//! and resolved through a [`QueueRegistry`].
//!
//! # Implementations
//!
//! - [`DirectoryQueue`]: spool directory with one JSON file per result,
//!   the only backend registered by [`QueueRegistry::with_builtin`]
//! - [`MemoryQueue`]: in-process FIFO for tests and embedding; its producer
//!   handle only exists in the embedding process, so it is constructed
//!   directly and never from configuration

pub mod directory;
pub mod memory;

pub use directory::{spool_for, submit, DirectoryQueue};
pub use memory::{MemoryQueue, MemoryQueueHandle};

use crate::config::QueueConfig;
use crate::domain::CheckResult;
use crate::error::QueueError;
use std::collections::BTreeMap;

/// Trait for queue backends delivering check results
pub trait QueueBackend: Send {
    /// Block until a result is available and return it
    ///
    /// The returned result carries a backend receipt used by [`delete`](Self::delete).
    fn next(&mut self) -> Result<CheckResult, QueueError>;

    /// Acknowledge a result, removing it from the backend
    ///
    /// Deleting the same result twice is a no-op.
    fn delete(&mut self, result: &CheckResult) -> Result<(), QueueError>;

    /// Backend name for identification
    fn name(&self) -> &str;
}

impl<Q: QueueBackend + ?Sized> QueueBackend for Box<Q> {
    fn next(&mut self) -> Result<CheckResult, QueueError> {
        (**self).next()
    }

    fn delete(&mut self, result: &CheckResult) -> Result<(), QueueError> {
        (**self).delete(result)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Constructor for a queue backend from its configuration
pub type BackendConstructor = fn(&QueueConfig) -> Result<Box<dyn QueueBackend>, QueueError>;

/// Registry mapping backend type keys to constructors
pub struct QueueRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl QueueRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in backends
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("directory", build_directory);
        registry
    }

    /// Register (or replace) a backend constructor
    pub fn register(&mut self, kind: impl Into<String>, constructor: BackendConstructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    /// Registered type keys
    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build the backend selected by the configuration
    ///
    /// # Errors
    /// Returns `QueueError::UnknownBackend` if no constructor is registered
    /// for the configured type, or the constructor's own error
    pub fn build(&self, config: &QueueConfig) -> Result<Box<dyn QueueBackend>, QueueError> {
        let kind = config.backend.to_lowercase();
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| QueueError::UnknownBackend(config.backend.clone()))?;

        log::info!(
            "Loading the {} queue backend (queue '{}' at {}:{})",
            kind,
            config.queue_name,
            config.host,
            config.port
        );
        constructor(config)
    }
}

fn build_directory(config: &QueueConfig) -> Result<Box<dyn QueueBackend>, QueueError> {
    Ok(Box::new(DirectoryQueue::from_config(config)?))
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Partition of a check id when results are spread over several consumers
///
/// All results of one check must reach the same consumer so its state
/// transitions stay ordered. Uses 64-bit FNV-1a, which is stable across
/// processes and platforms.
pub fn partition_for(check_id: &str, partitions: usize) -> usize {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    if partitions <= 1 {
        return 0;
    }

    let hash = check_id.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    (hash % partitions as u64) as usize
}
