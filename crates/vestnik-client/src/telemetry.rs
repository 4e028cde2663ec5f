//! Tracing subscriber setup for the embedding shell.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.  `RUST_LOG` overrides the
/// default filter; calling twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("vestnik_client=debug,vestnik_store=info,vestnik_media=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
