pub mod config;
pub mod db;
pub mod models;
pub mod reminders;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. RUST_LOG wins over the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
