//! alertflow - alert notification routing library
//!
//! Consumes check results from a queue, tracks check state and
//! dependencies, routes failing checks to contacts through tag-matching
//! rules, and delivers notifications with per-channel escalation delays.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`domain`]: Domain models with validation
//! - [`error`]: Error types
//! - [`escalation`]: Per-channel notification timing
//! - [`notify`]: Delivery handlers and dispatch
//! - [`queue`]: Result queue backends
//! - [`routing`]: Tag associations and route computation
//! - [`services`]: Result processing and engine assembly
//! - [`store`]: Persistence of check and notification state
//! - [`tracker`]: Check state, dependencies and maintenance

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod escalation;
pub mod notify;
pub mod queue;
pub mod routing;
pub mod services;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub mod mock;

pub use error::{AppError, Result};
