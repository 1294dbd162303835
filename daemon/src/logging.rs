use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// Without `debug_logging` the filter is pinned to `info` so a stray `RUST_LOG`
/// in the user's environment cannot turn on verbose hook tracing.  With it the
/// default becomes `debug` and `RUST_LOG` may override it.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
