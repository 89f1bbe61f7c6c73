//! # Forecast Math
//!
//! Numerical building blocks for the demand forecasting models.
//! This crate provides least-squares trend fitting, Holt's double
//! exponential smoothing, descriptive statistics and forecast accuracy
//! measures. It has no knowledge of timestamps or data frames.

use thiserror::Error;

pub mod accuracy;
pub mod regression;
pub mod smoothing;
pub mod stats;

pub use accuracy::{forecast_accuracy, ForecastAccuracy};
pub use regression::LinearRegression;
pub use smoothing::DoubleExponentialSmoothing;

/// Errors that can occur in forecasting calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;
