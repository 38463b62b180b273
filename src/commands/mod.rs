//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod check_config;
pub mod routes;
pub mod run;
pub mod submit;

pub use check_config::run_check_config;
pub use routes::run_routes;
pub use run::run_engine;
pub use submit::run_submit;

use crate::config::{Config, ConfigBuilder};
use crate::error::ConfigError;

/// Load the configuration named on the command line, or the default one
pub(crate) fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    Ok(ConfigBuilder::new().with_file(path)?.build())
}
