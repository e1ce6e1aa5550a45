//! Process-wide tracing setup shared by FieldGuard hosts and tests.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Like [`init`], with a custom fallback directive when `RUST_LOG` is unset.
pub fn init_with_default(directive: &str) {
    tracing::init(directive);
}

/// Human-readable output captured by the test harness.
pub fn init_for_tests() {
    tracing::init_test();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
