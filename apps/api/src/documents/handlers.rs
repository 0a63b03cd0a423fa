//! Axum route handlers for the Documents API.

use axum::{
    async_trait,
    extract::{multipart::MultipartRejection, FromRequestParts, Multipart, Path, State},
    http::{request::Parts, StatusCode},
    Json,
};
use bytes::BytesMut;
use serde::Serialize;
use uuid::Uuid;

use crate::documents::models::{DocumentId, DocumentStatus, DocumentSummary, DocumentView};
use crate::documents::registry::{Cancellation, DocumentStats};
use crate::documents::service::SubmitRequest;
use crate::documents::validation::{check_declared_type, check_received_size, UploadMetadata};
use crate::documents::transfer::TransferProgress;
use crate::errors::AppError;
use crate::state::AppState;

/// Multipart field carrying the resume.
const FILE_FIELD: &str = "file";

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub document_id: DocumentId,
    pub status: DocumentStatus,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelResponse {
    /// Still uploading; the record is gone.
    Discarded { document_id: DocumentId },
    Failed {
        document_id: DocumentId,
        previous_status: DocumentStatus,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Extractors
// ────────────────────────────────────────────────────────────────────────────

/// `:id` path segment parsed as a document id. Malformed ids are rejected
/// with the standard error body instead of axum's plain-text rejection.
pub struct DocumentPath(pub DocumentId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for DocumentPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(DocumentPath(id.into()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents
pub async fn handle_submit(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut upload = None;
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let meta = UploadMetadata {
            filename: field.file_name().unwrap_or_default().to_string(),
            mime_type: field.content_type().map(String::from),
        };
        // Reject by type before reading anything, and by size as soon as
        // the limit is crossed.
        check_declared_type(&meta)?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            buffer.extend_from_slice(&chunk);
            check_received_size(buffer.len() as u64)?;
        }
        upload = Some(SubmitRequest {
            filename: meta.filename,
            mime_type: meta.mime_type,
            bytes: buffer.freeze(),
        });
        break;
    }

    let request = upload.ok_or_else(|| {
        AppError::BadRequest(format!("multipart field '{FILE_FIELD}' is required"))
    })?;
    let doc = state.documents.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            document_id: doc.id,
            status: doc.status(),
        }),
    ))
}

/// GET /api/v1/documents
pub async fn handle_list(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    Json(state.documents.list().await)
}

/// GET /api/v1/documents/stats
pub async fn handle_stats(State(state): State<AppState>) -> Json<DocumentStats> {
    Json(state.documents.stats().await)
}

/// GET /api/v1/documents/:id
pub async fn handle_get(
    State(state): State<AppState>,
    DocumentPath(id): DocumentPath,
) -> Result<Json<DocumentView>, AppError> {
    Ok(Json(state.documents.get(id).await?))
}

/// GET /api/v1/documents/:id/progress
pub async fn handle_progress(
    State(state): State<AppState>,
    DocumentPath(id): DocumentPath,
) -> Result<Json<TransferProgress>, AppError> {
    Ok(Json(state.documents.progress(id).await?))
}

/// DELETE /api/v1/documents/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    DocumentPath(id): DocumentPath,
) -> Result<StatusCode, AppError> {
    state.documents.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/documents/:id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    DocumentPath(document_id): DocumentPath,
) -> Result<Json<CancelResponse>, AppError> {
    let response = match state.documents.cancel(document_id).await? {
        Cancellation::Discarded(_) => CancelResponse::Discarded { document_id },
        Cancellation::Failed { previous } => CancelResponse::Failed {
            document_id,
            previous_status: previous,
        },
    };
    Ok(Json(response))
}
