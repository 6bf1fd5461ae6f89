//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::detector::DetectorError;
use crate::service::ServiceError;
use crate::upload::UploadError;

/// Error response body. `error` is the human-readable message that web and
/// mobile clients display; `code` is stable for programmatic checks.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, code, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(e) => ApiError::Internal(format!("Failed to stage upload: {e}")),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Detector(DetectorError::UnsupportedInput(detail)) => {
                ApiError::BadRequest(detail)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn bad_request_returns_400_with_message() {
        let response = ApiError::BadRequest("No file provided".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No file provided");
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn internal_returns_500_carrying_message() {
        let response = ApiError::Internal("Analysis error: boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Analysis error: boom");
        assert_eq!(json["code"], "INTERNAL");
    }

    #[test]
    fn upload_validation_errors_are_client_errors() {
        for err in [
            UploadError::NoFile,
            UploadError::EmptyFilename,
            UploadError::InvalidType,
            UploadError::EmptyFile,
        ] {
            assert!(matches!(ApiError::from(err), ApiError::BadRequest(_)));
        }
        let io = UploadError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(matches!(ApiError::from(io), ApiError::Internal(_)));
    }

    #[test]
    fn invalid_type_message_is_preserved() {
        let err = ApiError::from(UploadError::InvalidType);
        assert_eq!(err.to_string(), "Invalid file type. Only PNG, JPG, JPEG allowed");
    }

    #[test]
    fn detector_errors_map_to_500() {
        let err: ApiError = ServiceError::Detector(DetectorError::Timeout(30)).into();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(err.to_string().contains("timed out"));

        let err: ApiError =
            ServiceError::Detector(DetectorError::UnsupportedInput("urls".into())).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn payload_too_large_returns_413() {
        let response = ApiError::PayloadTooLarge("too big".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
