//! # forecast_server
//!
//! HTTP front end for the best tracked demand model, plus the upload client.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use demand_forecast::{ColumnMapping, LoadedModel, PredictionService, TrainedForecastModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub mod client;
pub mod error;
pub mod routes;

pub use error::{ApiError, ErrorResponse};

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "forecast_server=info,demand_forecast=info,tower_http=info";

/// Description of the model being served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub run_id: String,
    pub experiment_id: String,
    pub metric: String,
    pub value: f64,
    pub model: String,
}

impl From<&LoadedModel> for ModelInfo {
    fn from(loaded: &LoadedModel) -> Self {
        Self {
            run_id: loaded.run.run_id().to_string(),
            experiment_id: loaded.run.experiment_id().to_string(),
            metric: loaded.metric.clone(),
            value: loaded.value,
            model: loaded.model.name().to_string(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    service: PredictionService,
    model_info: Arc<ModelInfo>,
}

impl AppState {
    pub fn new(
        model: Arc<dyn TrainedForecastModel>,
        mapping: ColumnMapping,
        model_info: ModelInfo,
    ) -> Self {
        Self {
            service: PredictionService::new(model, mapping),
            model_info: Arc::new(model_info),
        }
    }

    /// State serving the model chosen by the selector
    pub fn from_loaded(loaded: LoadedModel, mapping: ColumnMapping) -> Self {
        let info = ModelInfo::from(&loaded);
        Self::new(Arc::new(loaded.model), mapping, info)
    }
}

/// Build the application router
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/model", get(routes::model_info))
        .route("/predict", post(routes::predict))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
