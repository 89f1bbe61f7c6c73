//! Tracing subscriber setup shared by the binaries

use crate::error::{ForecastError, Result};
use tracing_subscriber::EnvFilter;

/// Set to `1` or `true` for JSON log lines
pub const JSON_LOG_ENV: &str = "FORECAST_JSON_LOG";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| ForecastError::ConfigurationError(format!("Invalid log filter: {}", e)))?;

    let json = std::env::var(JSON_LOG_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_target(true)
            .with_line_number(true)
            .with_env_filter(filter)
            .try_init()
    };

    installed.map_err(|e| ForecastError::ConfigurationError(format!("Logging already initialized: {}", e)))
}
