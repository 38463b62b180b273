//! Logger installation
//!
//! Lives in its own test binary since the logger is process-global.

use alertflow::cli::init_logging;
use log::Level;

#[test]
fn test_verbose_enables_debug_records() {
    std::env::remove_var("RUST_LOG");
    init_logging(true);

    assert!(log::log_enabled!(Level::Debug));
    assert!(!log::log_enabled!(Level::Trace));
}
