//! HTTP response types and error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::AppError;

/// Body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub channels: usize,
    pub programs: usize,
}

/// Wrapper that lets handlers return `AppError` directly
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                format!("{} '{}' not found", resource, id),
            ),
            AppError::Configuration { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Configuration error: {}", message),
            ),
            AppError::Xmltv(_) | AppError::Playlist(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Source could not be parsed".to_string(),
            ),
            AppError::Output(_) | AppError::Io(_) | AppError::Internal { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = ApiError(AppError::not_found("route", "/nope")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError(AppError::internal("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
