//! Domain models for alertflow
//!
//! This module contains all domain types with validation.
//! Types are validated on construction (fail-fast pattern).

pub mod check;
pub mod contact;
pub mod result;
pub mod rule;
pub mod tag;

pub use check::{Check, CheckState, Ingest, MaintenanceKind, MaintenanceWindow};
pub use contact::{Channel, Contact, Recipients};
pub use result::CheckResult;
pub use rule::{Rule, TimeRestriction};
pub use tag::Tag;
