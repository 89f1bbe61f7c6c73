//! Error types for the demand_forecast crate

use forecast_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Startup cannot proceed: bad settings, no usable runs, unreadable artifact
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Uploaded or loaded data is not valid tabular data in the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A model or worker failed while serving a request
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from the experiment tracking store
    #[error("Tracking store error: {0}")]
    TrackingError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl ForecastError {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ForecastError::ParseError(_) | ForecastError::DataError(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::ParseError(err.to_string())
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InsufficientData(msg) => ForecastError::DataError(msg),
            MathError::InvalidInput(msg) => ForecastError::InvalidParameter(msg),
            MathError::CalculationError(msg) => ForecastError::InternalError(msg),
        }
    }
}

impl From<config::ConfigError> for ForecastError {
    fn from(err: config::ConfigError) -> Self {
        ForecastError::ConfigurationError(err.to_string())
    }
}
