//! Structured JSON logging filtered through `RUST_LOG`.
//!
//! Without `RUST_LOG` the panel crates log at `info` and everything else at
//! `warn`, so dependency chatter stays out of the audit-adjacent logs.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn,arboleda_auth=info,arboleda_infra=info";

pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber; returns `false` if one was already set.
pub fn try_init() -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .json()
        .with_current_span(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        ::tracing::debug!(default_filter = DEFAULT_FILTER, "tracing subscriber installed");
    }
    installed
}

pub fn init() {
    let _ = try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn init_is_idempotent() {
        init();
        assert!(!try_init());
    }
}
