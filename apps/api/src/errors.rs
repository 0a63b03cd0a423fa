use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::documents::error::DocumentError;
use crate::documents::validation::ValidationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not implemented")]
    NotImplemented,
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound(_) => AppError::NotFound(err.to_string()),
            DocumentError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            DocumentError::Validation(e) => AppError::Validation(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(e) => {
                let status = match e {
                    ValidationError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    ValidationError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    ValidationError::Empty => StatusCode::BAD_REQUEST,
                };
                (status, e.code(), e.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            // The body limit surfaces here when it trips before the file
            // field is reached.
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (StatusCode::PAYLOAD_TOO_LARGE, "TOO_LARGE", e.body_text())
            }
            AppError::Multipart(e) => (e.status(), "MALFORMED_UPLOAD", e.body_text()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                "This endpoint is not yet implemented".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::models::{DocumentId, DocumentStatus};

    #[test]
    fn test_validation_status_codes() {
        let unsupported = AppError::from(ValidationError::UnsupportedType {
            declared: "application/zip".to_string(),
        });
        assert_eq!(
            unsupported.into_response().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );

        let too_large = AppError::from(ValidationError::TooLarge {
            size_bytes: 6_000_000,
            limit_bytes: 5_242_880,
        });
        assert_eq!(
            too_large.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_document_errors_map_to_http() {
        let id = DocumentId::new();
        assert_eq!(
            AppError::from(DocumentError::NotFound(id))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(DocumentError::InvalidTransition {
                id,
                from: DocumentStatus::Completed,
                to: DocumentStatus::Failed,
            })
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
    }
}
