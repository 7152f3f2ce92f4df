//! Process-wide logging setup shared by every binary and test harness.

/// Initialize process-wide tracing with the format chosen by `KIDBANK_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, formats).
pub mod tracing;

pub use tracing::LogFormat;
