//! HTTP error responses

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use demand_forecast::ForecastError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// JSON error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// The request itself is unusable
    #[error("{message}")]
    BadRequest { status: StatusCode, message: String },

    /// The forecast worker died
    #[error("{0}")]
    Worker(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forecast(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Forecast(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { status, .. } => *status,
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest {
            status: err.status(),
            message: format!("Invalid multipart body: {}", err.body_text()),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(%status, error = %message, "Request failed");
        } else {
            warn!(%status, error = %message, "Request rejected");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let parse = ApiError::from(ForecastError::ParseError("bad date".to_string()));
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);

        let data = ApiError::from(ForecastError::DataError("empty".to_string()));
        assert_eq!(data.status(), StatusCode::BAD_REQUEST);

        let internal = ApiError::from(ForecastError::InternalError("boom".to_string()));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let config = ApiError::from(ForecastError::ConfigurationError("x".to_string()));
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            ApiError::bad_request("no file").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_message_is_error_text() {
        let err = ApiError::from(ForecastError::ParseError("bad date".to_string()));
        assert_eq!(err.to_string(), "Parse error: bad date");
    }
}
