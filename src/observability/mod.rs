//! Logging initialization.
//!
//! Wires the `tracing` subscriber used by every service in this crate.
//! Output format and verbosity come from `RUST_LOG` (standard `EnvFilter`
//! directives), falling back to the given default when unset.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global tracing subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// `default_directive` is used when `RUST_LOG` is not set, e.g. `"info"` or
/// `"filedup=debug"`.
pub fn init_logging(default_directive: &str) {
    LOGGING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    });
}
