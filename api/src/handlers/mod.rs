pub mod events;
pub mod health;
pub mod metrics;
pub mod triggers;

// Common response types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::errors::{ApiError, EngineError};
use serde::Serialize;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl From<EngineError> for ErrorResponse {
    fn from(err: EngineError) -> Self {
        if let EngineError::Storage(storage) = &err {
            tracing::error!(error = %storage, "Storage failure while serving request");
        }

        let api_error = ApiError::from(err);
        let mut response = Self::new(api_error.code.to_lowercase(), api_error.message);
        response.details = api_error.details;
        response
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" | "bad_request" => StatusCode::BAD_REQUEST,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Standard API success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::{StorageError, ValidationError};
    use uuid::Uuid;

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        let cases = [
            (
                EngineError::from(ValidationError::MissingField("name".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::trigger_not_found(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                EngineError::from(StorageError::ConnectionFailed("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ErrorResponse::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
