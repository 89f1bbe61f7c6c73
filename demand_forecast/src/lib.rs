//! # Demand Forecast
//!
//! Demand forecasting with tracked training runs and best-model serving.
//!
//! ## Features
//!
//! - CSV loading and preparation into a fixed `ds`/`y` time series schema
//! - Forecasting models (additive trend + weekly seasonality, Holt) with
//!   uncertainty intervals
//! - A filesystem experiment tracking store for runs, metrics, params and
//!   artifacts
//! - Selection of the run with the lowest error metric and a prediction
//!   service for uploaded datasets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::data::ColumnMapping;
//! use demand_forecast::prediction::PredictionService;
//! use demand_forecast::selection::ModelSelector;
//! use demand_forecast::tracking::FileTrackingStore;
//! use std::sync::Arc;
//!
//! # fn main() -> demand_forecast::Result<()> {
//! let store = FileTrackingStore::open("mlruns")?;
//! let loaded = ModelSelector::default().load_best(&store)?;
//!
//! let service = PredictionService::new(
//!     Arc::new(loaded.model),
//!     ColumnMapping::new("date", "sales")?,
//! );
//! let rows = service.predict(b"date,sales\n2023-02-01,\n2023-02-02,\n")?;
//! println!("{} forecast rows", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod prediction;
pub mod selection;
pub mod tracking;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::config::ServiceConfig;
pub use crate::data::{ColumnMapping, DataLoader, TimeSeriesData};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{
    ForecastFrame, ForecastModel, ForecastRow, ModelKind, TrainedForecastModel, TrainedModel,
};
pub use crate::prediction::PredictionService;
pub use crate::selection::{LoadedModel, ModelSelector};
pub use crate::tracking::{FileTrackingStore, TrackingStore};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
