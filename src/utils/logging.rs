//! Structured logging setup.
//!
//! Installs a `tracing` subscriber from [`LoggingConfig`]. `RUST_LOG` takes
//! precedence over the configured level when set. Safe to call more than once;
//! later calls are no-ops.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_format {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
