use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialise the global tracing subscriber.
///
/// The log level is controlled by the `RUST_LOG` environment variable
/// (e.g. `RUST_LOG=debug` or `RUST_LOG=guard=debug,info`). When `RUST_LOG`
/// is not set the subscriber falls back to `default_directive`.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(false)
            .with_env_filter(filter)
            .try_init();
    });
}
