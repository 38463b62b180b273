//! alertflow - tag-routed alert notification engine
//!
//! Consumes check results from a queue and notifies the contacts whose
//! rules match the check's tags.

use alertflow::cli::args::{generate_completions, Cli, Commands};
use alertflow::cli::init_logging;
use alertflow::commands::{run_check_config, run_engine, run_routes, run_submit};
use alertflow::error::{AppError, ConfigError, QueueError, StoreError};
use clap::Parser;

fn main() {
    // Parse CLI arguments first so --verbose reaches the logger
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Run(args) => run_engine(args, config),

        Commands::CheckConfig => run_check_config(config, cli.format),

        Commands::Routes { check } => run_routes(check.as_deref(), config, cli.format),

        Commands::Submit(args) => run_submit(args, config, cli.format),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Config(ConfigError::FileNotFound(_)) => {
            eprintln!();
            eprintln!("Hint: Pass --config or set ALERTFLOW_CONFIG to an existing file.");
            eprintln!("      Without either, alertflow.toml in the working directory is used.");
        }
        AppError::Config(ConfigError::TomlError(_)) | AppError::Config(ConfigError::ParseError(_)) => {
            eprintln!();
            eprintln!("Hint: Run 'alertflow check-config' to validate the file.");
            eprintln!("      Datetimes must be quoted RFC 3339 strings.");
        }
        AppError::Queue(QueueError::UnknownBackend(_)) => {
            eprintln!();
            eprintln!("Hint: The only built-in queue type is 'directory'.");
        }
        AppError::Store(StoreError::Serialization(_)) => {
            eprintln!();
            eprintln!("Hint: The state file is corrupt. Move it aside to start with empty state.");
        }
        _ => {}
    }
}
