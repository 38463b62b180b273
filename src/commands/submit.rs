//! Submit command implementation
//!
//! Writes one check result into the spool of the directory queue, where a
//! running engine picks it up.

use super::load_config;
use crate::cli::args::{OutputFormat, SubmitArgs};
use crate::cli::output::{print_output, Message};
use crate::config::{ConfigBuilder, QueueConfig};
use crate::domain::CheckResult;
use crate::error::Result;
use crate::queue::{spool_for, submit};

use chrono::Utc;
use std::path::PathBuf;

/// Execute the submit command
pub fn run_submit(args: &SubmitArgs, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let config = ConfigBuilder::new()
        .with_config(load_config(config_path)?)
        .with_spool(args.spool.clone())
        .build();

    if !config.queue.backend.eq_ignore_ascii_case("directory") {
        log::warn!(
            "Configured queue backend is '{}', the result is written to a directory spool anyway",
            config.queue.backend
        );
    }

    let result = CheckResult::new(
        args.check_id.as_str(),
        args.state,
        args.timestamp.unwrap_or_else(Utc::now),
        args.summary.as_str(),
    );
    let (spool, name) = submit_result(&config.queue, &result)?;

    let msg = Message {
        message: format!(
            "Queued {} result for {} as {}",
            result.state,
            result.check_id,
            spool.join(name).display()
        ),
        success: true,
    };
    print_output(&msg, format)?;

    Ok(())
}

/// Write a result to the spool its check belongs to
pub fn submit_result(queue: &QueueConfig, result: &CheckResult) -> Result<(PathBuf, String)> {
    let spool = spool_for(queue, &result.check_id);
    let name = submit(&spool, result)?;
    Ok((spool, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckState;
    use crate::queue::{partition_for, DirectoryQueue, QueueBackend};
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn queue_config(spool: &TempDir, partitions: Option<i64>) -> QueueConfig {
        let mut config = QueueConfig::default();
        config.options.insert(
            "path".to_string(),
            toml::Value::String(spool.path().display().to_string()),
        );
        if let Some(n) = partitions {
            config
                .options
                .insert("partitions".to_string(), toml::Value::Integer(n));
        }
        config
    }

    fn result() -> CheckResult {
        CheckResult::new(
            "db01:disk",
            CheckState::Critical,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            "disk full",
        )
    }

    #[test]
    fn test_submitted_result_is_consumed() {
        let dir = TempDir::new().unwrap();
        let config = queue_config(&dir, None);

        let (spool, _) = submit_result(&config, &result()).unwrap();
        assert_eq!(spool, dir.path());

        let mut queue = DirectoryQueue::open(dir.path(), Duration::from_millis(10)).unwrap();
        let consumed = queue.next().unwrap();
        assert_eq!(consumed.check_id, "db01:disk");
        assert_eq!(consumed.state, CheckState::Critical);
        assert_eq!(consumed.summary, "disk full");
    }

    #[test]
    fn test_submit_to_partition() {
        let dir = TempDir::new().unwrap();
        let config = queue_config(&dir, Some(4));

        let (spool, _) = submit_result(&config, &result()).unwrap();
        let partition = partition_for("db01:disk", 4);
        assert_eq!(spool, dir.path().join(partition.to_string()));
        assert_eq!(std::fs::read_dir(&spool).unwrap().count(), 1);
    }
}
