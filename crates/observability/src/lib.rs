//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide logging.
///
/// Output format comes from `SUPPLY_LOG_FORMAT` (`json` or `pretty`, default
/// `json`). Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

pub use tracing::{LogFormat, init_with};

/// Tracing configuration (filters, formats).
pub mod tracing;
