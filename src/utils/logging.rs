//! Logging initialization
//!
//! Sets up the tracing subscriber for the gateway process. The filter is
//! taken from `RUST_LOG` when present, falling back to `info`.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `dev_mode` switches to a more verbose, human-oriented format with
/// target paths included.
pub fn init_tracing(dev_mode: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if dev_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(dev_mode)
        .with_thread_ids(false);

    // A second init (tests, embedders) is not an error worth failing over.
    let _ = builder.try_init();
}
