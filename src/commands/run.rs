//! Run command implementation
//!
//! Builds the engine from configuration and processes results until the
//! queue closes or a shutdown signal arrives.

use super::load_config;
use crate::cli::args::RunArgs;
use crate::config::{Config, ConfigBuilder};
use crate::error::Result;
use crate::notify::NotifierRegistry;
use crate::queue::QueueRegistry;
use crate::services::build_processor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execute the run command
pub fn run_engine(args: &RunArgs, config_path: Option<&str>) -> Result<()> {
    let config = apply_overrides(load_config(config_path)?, args);

    let mut processor = build_processor(
        &config,
        &QueueRegistry::with_builtin(),
        &NotifierRegistry::with_builtin(),
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            log::warn!("Received second shutdown signal, exiting");
            std::process::exit(130);
        }
        log::info!("Received shutdown signal, stopping after the current result");
    })
    .map_err(std::io::Error::other)?;

    let outcome = processor.run(&stop);

    log::info!("Waiting for delivery workers to finish");
    processor.shutdown();

    let processed = outcome?;
    log::info!("Stopped after processing {} results", processed);
    Ok(())
}

/// Apply the command line overrides of the run command
fn apply_overrides(config: Config, args: &RunArgs) -> Config {
    ConfigBuilder::new()
        .with_config(config)
        .with_queue_type(args.queue_type.clone())
        .with_queue_name(args.queue_name.clone())
        .with_spool(args.spool.clone())
        .with_store_path(args.store.clone())
        .with_inline_dispatch(args.inline)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::DispatchMode;
    use std::path::PathBuf;

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs {
            queue_type: Some("memory".to_string()),
            queue_name: Some("checks".to_string()),
            spool: Some(PathBuf::from("/var/spool/alertflow")),
            store: Some(PathBuf::from("/var/lib/alertflow/state.json")),
            inline: true,
        };

        let config = apply_overrides(Config::default(), &args);
        assert_eq!(config.queue.backend, "memory");
        assert_eq!(config.queue.queue_name, "checks");
        assert_eq!(
            config.queue.options.get("path").and_then(|v| v.as_str()),
            Some("/var/spool/alertflow")
        );
        assert_eq!(
            config.store.path,
            Some(PathBuf::from("/var/lib/alertflow/state.json"))
        );
        assert_eq!(config.general.dispatch, DispatchMode::Inline);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let config = apply_overrides(Config::default(), &RunArgs::default());
        assert_eq!(config.queue.backend, "directory");
        assert!(config.store.path.is_none());
        assert_eq!(config.general.dispatch, DispatchMode::Background);
    }
}
