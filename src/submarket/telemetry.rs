//! Logging setup

use env_logger::{Builder, Env};

/// Initialise the global logger once. `RUST_LOG` wins over `default_level`.
///
/// Calling this again is harmless; later calls leave the first logger in place.
pub fn init(default_level: &str) {
    let result = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("Logger initialised (default level: {})", default_level);
    }
}
