//! Service layer for result processing
//!
//! The processor runs results through the engine; setup builds one from
//! configuration.

pub mod processor;
pub mod setup;

pub use processor::{DeliveryFailure, ProcessOutcome, Processor, Suppression};
pub use setup::{build_processor, Setup};
