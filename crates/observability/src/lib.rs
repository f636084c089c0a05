//! Process-wide logging setup for the admin panel services.

/// Install the JSON tracing subscriber.
///
/// Idempotent: once a global subscriber exists, later calls do nothing.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (filter, format).
pub mod tracing;
