//! # Telemetry
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` takes precedence over
//! the configured filter.

use crate::config::{LogConfig, LogFormat};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber described by `config`.
///
/// Returns `false` if a subscriber was already installed, in which case the
/// existing one is left alone. Safe to call more than once.
pub fn init_tracing(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        // Nothing else in this test binary installs a global subscriber.
        let config = LogConfig::default();
        assert!(init_tracing(&config));
        assert!(!init_tracing(&config));
    }
}
