//! Spool directory queue backend
//!
//! Each pending result is one JSON file in the spool directory. `next()`
//! polls for the oldest file (file names start with a zero-padded submission
//! time, so lexical order is arrival order); `delete()` removes it.
//! Files that survive a crash are delivered again on restart.
//!
//! Files that cannot be decoded are moved to `rejected/` so they never stall
//! the consumer.

use super::{partition_for, QueueBackend};
use crate::config::QueueConfig;
use crate::domain::CheckResult;
use crate::error::QueueError;
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Default polling interval when the spool is empty
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Sub-directory for undecodable files
const REJECTED_DIR: &str = "rejected";

static SUBMIT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Queue backed by a directory of JSON files
#[derive(Debug)]
pub struct DirectoryQueue {
    path: PathBuf,
    poll_interval: Duration,
    in_flight: HashSet<String>,
}

impl DirectoryQueue {
    /// Open (creating if needed) a spool directory
    pub fn open<P: AsRef<Path>>(path: P, poll_interval: Duration) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(path.join(REJECTED_DIR)).map_err(|e| {
            QueueError::InitializationFailed {
                backend: "directory".to_string(),
                message: format!("{}: {}", path.display(), e),
            }
        })?;

        Ok(Self {
            path,
            poll_interval,
            in_flight: HashSet::new(),
        })
    }

    /// Open the spool directory described by the queue configuration
    ///
    /// Options: `path` (default `<data dir>/alertflow/<queue_name>`) and
    /// `poll_interval_ms` (default 500).
    ///
    /// With `partitions = N` (N > 1) the consumer reads the sub-directory
    /// named by its `partition` option (default 0).
    pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        let mut path = base_path(config);

        let partitions = u64_option(config, "partitions").unwrap_or(1);
        if partitions > 1 {
            let partition = u64_option(config, "partition").unwrap_or(0);
            if partition >= partitions {
                return Err(QueueError::InitializationFailed {
                    backend: "directory".to_string(),
                    message: format!(
                        "partition {} is out of range for {} partitions",
                        partition, partitions
                    ),
                });
            }
            path = path.join(partition.to_string());
        }

        let poll_interval = u64_option(config, "poll_interval_ms").unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Self::open(path, Duration::from_millis(poll_interval))
    }

    /// Default spool location for a queue name
    pub fn default_path(queue_name: &str) -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("alertflow")
            .join(queue_name)
    }

    /// Spool directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pending file names in arrival order, excluding in-flight ones
    fn pending_files(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json") && !name.starts_with('.'))
            .filter(|name| !self.in_flight.contains(name))
            .collect();
        names.sort();
        Ok(names)
    }

    fn reject(&self, name: &str, reason: &str) {
        log::warn!("Rejecting queued file {}: {}", name, reason);
        let from = self.path.join(name);
        let to = self.path.join(REJECTED_DIR).join(name);
        if let Err(e) = fs::rename(&from, &to) {
            log::error!("Failed to move {} aside: {}", from.display(), e);
        }
    }
}

impl QueueBackend for DirectoryQueue {
    fn next(&mut self) -> Result<CheckResult, QueueError> {
        loop {
            for name in self.pending_files()? {
                let bytes = match fs::read(self.path.join(&name)) {
                    Ok(bytes) => bytes,
                    // Removed by another consumer between listing and reading
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };

                match CheckResult::from_json(&bytes) {
                    Ok(result) => {
                        self.in_flight.insert(name.clone());
                        return Ok(result.with_receipt(name));
                    }
                    Err(e) => self.reject(&name, &e.to_string()),
                }
            }

            thread::sleep(self.poll_interval);
        }
    }

    fn delete(&mut self, result: &CheckResult) -> Result<(), QueueError> {
        let Some(name) = result.receipt.as_deref() else {
            return Err(QueueError::Decode(format!(
                "result for '{}' was not delivered by this queue",
                result.check_id
            )));
        };

        match fs::remove_file(self.path.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.in_flight.remove(name);
        Ok(())
    }

    fn name(&self) -> &str {
        "directory"
    }
}

fn base_path(config: &QueueConfig) -> PathBuf {
    match config.options.get("path").and_then(|v| v.as_str()) {
        Some(path) => PathBuf::from(path),
        None => DirectoryQueue::default_path(&config.queue_name),
    }
}

fn u64_option(config: &QueueConfig, key: &str) -> Option<u64> {
    config
        .options
        .get(key)
        .and_then(|v| v.as_integer())
        .and_then(|v| u64::try_from(v).ok())
}

/// Spool directory a producer writes a check's results to
pub fn spool_for(config: &QueueConfig, check_id: &str) -> PathBuf {
    let base = base_path(config);
    match u64_option(config, "partitions") {
        Some(n) if n > 1 => base.join(partition_for(check_id, n as usize).to_string()),
        _ => base,
    }
}

/// Write a result into a spool directory
///
/// The file is written under a temporary name and renamed into place so a
/// polling consumer never reads a partial file. Returns the file name.
pub fn submit<P: AsRef<Path>>(spool: P, result: &CheckResult) -> Result<String, QueueError> {
    let spool = spool.as_ref();
    fs::create_dir_all(spool)?;

    let seq = SUBMIT_SEQ.fetch_add(1, Ordering::SeqCst);
    let name = format!(
        "{:016}-{}-{:06}.json",
        Utc::now().timestamp_micros(),
        std::process::id(),
        seq
    );
    let tmp = spool.join(format!(".{}.tmp", name));

    fs::write(&tmp, result.to_json()?)?;
    fs::rename(&tmp, spool.join(&name))?;

    log::debug!("Queued result for {} as {}", result.check_id, name);
    Ok(name)
}
