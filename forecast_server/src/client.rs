//! Upload client for the prediction service

use crate::error::ErrorResponse;
use crate::routes::UPLOAD_FIELD;
use demand_forecast::ForecastRow;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// File name attached to every upload
pub const UPLOAD_FILE_NAME: &str = "test_dataset.csv";
/// Request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("The uploaded file has no data rows")]
    EmptyDataset,

    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Header and first rows of a CSV upload
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Number of data rows in the whole file
    pub total_rows: usize,
}

impl DatasetPreview {
    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }
}

/// Read the header, count the data rows and keep the first `limit` of them
pub fn preview_csv(bytes: &[u8], limit: usize) -> Result<DatasetPreview, ClientError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| ClientError::InvalidCsv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    let mut total_rows = 0;
    for record in reader.records() {
        let record = record.map_err(|e| ClientError::InvalidCsv(e.to_string()))?;
        if rows.len() < limit {
            rows.push(record.iter().map(str::to_string).collect());
        }
        total_rows += 1;
    }

    Ok(DatasetPreview {
        headers,
        rows,
        total_rows,
    })
}

/// Write predictions as pretty JSON
pub fn save_predictions<P: AsRef<Path>>(path: P, rows: &[ForecastRow]) -> Result<(), ClientError> {
    let json = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// HTTP client for `POST /predict`
#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: reqwest::Client,
    base_url: String,
}

impl ForecastClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url)
    }

    /// Upload CSV bytes and return the forecast rows.
    ///
    /// A file with a header but no data rows is rejected before any request
    /// is made. Files the preview cannot parse are still sent so the service
    /// reports the problem.
    pub async fn predict(&self, csv_bytes: Vec<u8>) -> Result<Vec<ForecastRow>, ClientError> {
        if matches!(preview_csv(&csv_bytes, 0), Ok(preview) if preview.is_empty()) {
            return Err(ClientError::EmptyDataset);
        }

        let part = Part::bytes(csv_bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("text/csv")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let url = self.predict_url();
        debug!(%url, "Uploading dataset");
        let response = self.http.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
