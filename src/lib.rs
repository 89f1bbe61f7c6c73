//! # Demand Forecasting
//!
//! Umbrella crate for the demand forecasting workspace.
//!
//! - [`forecast_math`]: regression, smoothing and accuracy building blocks
//! - [`demand_forecast`]: data preparation, models, tracking, selection and
//!   the prediction service
//! - [`forecast_server`]: the HTTP API and upload client
//!
//! ## Example
//!
//! ```
//! use demand_forecasting_workspace::demand_forecast::data::ColumnMapping;
//!
//! let mapping = ColumnMapping::new("date", "sales").unwrap();
//! assert_eq!(mapping.target_column(), "sales");
//! ```

pub use demand_forecast;
pub use forecast_math;
pub use forecast_server;

#[cfg(test)]
mod tests {
    #[test]
    fn test_crates_are_linked() {
        assert_eq!(demand_forecast::NAME, "demand_forecast");
        assert!(forecast_server::DEFAULT_LOG_FILTER.contains("forecast_server"));
        assert_eq!(forecast_math::stats::mean(&[1.0, 3.0]).unwrap(), 2.0);
    }
}
