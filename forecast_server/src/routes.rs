//! API route handlers

use crate::error::ApiError;
use crate::AppState;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use demand_forecast::ForecastRow;
use serde::Serialize;
use tracing::info;

/// Multipart field carrying the uploaded CSV
pub const UPLOAD_FIELD: &str = "file";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Demand Forecasting API</title>
  </head>
  <body>
    <h1>Demand Forecasting API</h1>
    <p>Upload a CSV file with a <code>POST</code> to <code>/predict</code> using the
    multipart field <code>file</code>. The response is a JSON array of
    <code>ds</code>, <code>yhat</code>, <code>yhat_lower</code> and
    <code>yhat_upper</code> records, one per uploaded row.</p>
    <p>See <code>/model</code> for the model being served and <code>/health</code> for liveness.</p>
  </body>
</html>
"#;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn model_info(State(state): State<AppState>) -> Json<crate::ModelInfo> {
    Json(state.model_info.as_ref().clone())
}

/// Forecast the periods covered by an uploaded CSV
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ForecastRow>>, ApiError> {
    let mut multipart = multipart?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| {
        ApiError::bad_request(format!("Missing multipart field '{}'", UPLOAD_FIELD))
    })?;

    let service = state.service.clone();
    let size = bytes.len();
    let rows = tokio::task::spawn_blocking(move || service.predict(&bytes))
        .await
        .map_err(|e| ApiError::Worker(format!("Forecast worker failed: {}", e)))??;

    info!(bytes = size, rows = rows.len(), "Served forecast");
    Ok(Json(rows))
}
