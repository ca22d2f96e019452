//! Error type for the dashboard API boundary.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::relay::RelayError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("{0}")]
    BadRequest(String),

    /// Request body that is not the expected JSON.
    #[error("Invalid request body: {}", .0.body_text())]
    InvalidBody(JsonRejection),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    timestamp: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::InvalidContact(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::BackupNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Relay(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidBody(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status_code = status.as_u16(), error = %self, "api_request_failed");
        }
        let body = ErrorBody {
            success: false,
            message: self.to_string(),
            timestamp: crate::util::format_iso(&crate::util::now()),
        };
        (status, Json(body)).into_response()
    }
}
