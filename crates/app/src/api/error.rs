//! Maps service errors onto HTTP responses with an `{"error": ...}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use journey_core::model::{ClaimError, ParseIdError};
use services::{JourneyServiceError, SessionServiceError};
use storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound => StatusCode::NOT_FOUND,
        StorageError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ParseIdError> for ApiError {
    fn from(err: ParseIdError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<JourneyServiceError> for ApiError {
    fn from(err: JourneyServiceError) -> Self {
        let status = match &err {
            JourneyServiceError::NoJourney { .. } => StatusCode::NOT_FOUND,
            JourneyServiceError::AlreadyExists { .. } => StatusCode::CONFLICT,
            JourneyServiceError::Journey(_) => StatusCode::BAD_REQUEST,
            JourneyServiceError::Claim(ClaimError::StepNotFound { .. }) => StatusCode::NOT_FOUND,
            JourneyServiceError::Claim(_) => StatusCode::CONFLICT,
            JourneyServiceError::Storage(e) => storage_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<SessionServiceError> for ApiError {
    fn from(err: SessionServiceError) -> Self {
        let status = match &err {
            SessionServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            SessionServiceError::Storage(e) => storage_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}
