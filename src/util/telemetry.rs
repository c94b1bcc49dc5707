//! Tracing setup for hosts that do not install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "prometheus_mcp_cluster=info";

/// Build the filter for `directives`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn filter_for(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a fmt subscriber filtered by `RUST_LOG`. Returns `false` when a
/// global subscriber was already set, in which case nothing changes.
pub fn init_tracing() -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let directives = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(directives.as_deref()))
        .with_target(true)
        .try_init()
        .is_ok()
}
