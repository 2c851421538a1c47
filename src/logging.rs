// Tracing subscriber bootstrap
//
// `RUST_LOG` wins when set; otherwise the filter from `HostConfig` applies.
// Safe to call more than once: later calls leave the first subscriber in place.

use tracing_subscriber::EnvFilter;

pub fn init(fallback_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .try_init();

    if installed.is_ok() {
        tracing::debug!(filter = fallback_filter, "tracing initialized");
    }
}
