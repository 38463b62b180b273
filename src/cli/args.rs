//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use crate::domain::CheckState;
use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Tag-routed alert notification engine
///
/// Consumes check results from a queue, routes them to contacts by tag and
/// delivers notifications with escalation delays.
#[derive(Parser, Debug)]
#[command(name = "alertflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "ALERTFLOW_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume results and deliver notifications until stopped
    Run(RunArgs),

    /// Validate the configuration and print a summary
    CheckConfig,

    /// Show the notification routes of checks
    Routes {
        /// Only show routes of this check
        check: Option<String>,
    },

    /// Write a check result into the directory queue
    Submit(SubmitArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Queue backend type (overrides config)
    #[arg(long)]
    pub queue_type: Option<String>,

    /// Queue name (overrides config)
    #[arg(long)]
    pub queue_name: Option<String>,

    /// Spool directory of the directory queue
    #[arg(long)]
    pub spool: Option<PathBuf>,

    /// State store file (in-memory when not set)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Deliver notifications on the processing thread
    #[arg(long)]
    pub inline: bool,
}

/// Arguments for the submit command
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Check identifier
    pub check_id: String,

    /// Check state (ok, warning, critical, unknown)
    #[arg(value_parser = parse_state)]
    pub state: CheckState,

    /// Human-readable summary
    #[arg(default_value = "")]
    pub summary: String,

    /// Result time as RFC 3339 (defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Spool directory (overrides config)
    #[arg(long)]
    pub spool: Option<PathBuf>,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

fn parse_state(s: &str) -> Result<CheckState, String> {
    s.parse::<CheckState>().map_err(|e| e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cli_parse_check_config() {
        let args = Cli::try_parse_from(["alertflow", "check-config"]).unwrap();
        assert!(matches!(args.command, Commands::CheckConfig));
    }

    #[test]
    fn test_cli_parse_verbose_and_config() {
        let args =
            Cli::try_parse_from(["alertflow", "-v", "--config", "a.toml", "check-config"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("a.toml"));
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let args = Cli::try_parse_from([
            "alertflow",
            "run",
            "--queue-type",
            "memory",
            "--store",
            "/tmp/state.json",
            "--inline",
        ])
        .unwrap();

        if let Commands::Run(run) = args.command {
            assert_eq!(run.queue_type.as_deref(), Some("memory"));
            assert_eq!(run.store, Some(PathBuf::from("/tmp/state.json")));
            assert!(run.inline);
            assert!(run.spool.is_none());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_submit() {
        let args = Cli::try_parse_from([
            "alertflow",
            "submit",
            "db01:disk",
            "CRITICAL",
            "disk full",
            "--timestamp",
            "2024-01-01T00:00:30Z",
        ])
        .unwrap();

        if let Commands::Submit(submit) = args.command {
            assert_eq!(submit.check_id, "db01:disk");
            assert_eq!(submit.state, CheckState::Critical);
            assert_eq!(submit.summary, "disk full");
            assert_eq!(
                submit.timestamp,
                Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 30).unwrap())
            );
        } else {
            panic!("Expected Submit command");
        }
    }

    #[test]
    fn test_cli_submit_rejects_unknown_state() {
        let result = Cli::try_parse_from(["alertflow", "submit", "db01:disk", "broken"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_routes_filter() {
        let args = Cli::try_parse_from(["alertflow", "routes", "db01:disk"]).unwrap();
        if let Commands::Routes { check } = args.command {
            assert_eq!(check.as_deref(), Some("db01:disk"));
        } else {
            panic!("Expected Routes command");
        }
    }
}
