use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::rating::ScoreLabel;
use crate::analysis::AnalysisOutcome;
use crate::documents::error::DocumentError;

/// Opaque identifier assigned to a Document at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The document formats the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [DocumentKind::Pdf, DocumentKind::Doc, DocumentKind::Docx];

    pub const fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Doc => "application/msword",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Doc => "doc",
            DocumentKind::Docx => "docx",
        }
    }

    /// Matches a declared MIME type, ignoring case and any `; charset=...` parameters.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime_type().eq_ignore_ascii_case(essence))
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploading,
    Queued,
    Analyzing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Uploading,
        DocumentStatus::Queued,
        DocumentStatus::Analyzing,
        DocumentStatus::Completed,
        DocumentStatus::Failed,
    ];

    /// The allowed edges of the document lifecycle. Any live state may fail;
    /// everything else moves strictly forward one step.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Uploading, Queued)
                | (Queued, Analyzing)
                | (Analyzing, Completed)
                | (Uploading | Queued | Analyzing, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploading => "uploading",
            DocumentStatus::Queued => "queued",
            DocumentStatus::Analyzing => "analyzing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a document ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Transfer { message: String },
    Analysis { message: String },
    Timeout,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transfer { message } => write!(f, "transfer error: {message}"),
            FailureReason::Analysis { message } => write!(f, "analysis error: {message}"),
            FailureReason::Timeout => f.write_str("analysis timed out"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Lifecycle state. Terminal variants carry their payload so results and
/// errors can only exist in the matching state.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    Uploading,
    Queued,
    Analyzing,
    Completed(AnalysisOutcome),
    Failed(FailureReason),
}

impl DocumentState {
    pub fn status(&self) -> DocumentStatus {
        match self {
            DocumentState::Uploading => DocumentStatus::Uploading,
            DocumentState::Queued => DocumentStatus::Queued,
            DocumentState::Analyzing => DocumentStatus::Analyzing,
            DocumentState::Completed(_) => DocumentStatus::Completed,
            DocumentState::Failed(_) => DocumentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: DocumentStatus,
    pub at: DateTime<Utc>,
}

/// A submitted resume tracked through transfer and analysis.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub kind: DocumentKind,
    /// Key of the raw bytes in blob storage. The registry never holds the bytes.
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Creation order, used to break timestamp ties when listing.
    pub seq: u64,
    pub progress: u8,
    pub state: DocumentState,
    pub history: Vec<StatusChange>,
}

impl Document {
    pub fn new(id: DocumentId, filename: String, kind: DocumentKind, size_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename,
            size_bytes,
            mime_type: kind.mime_type().to_string(),
            kind,
            storage_key: storage_key_for(id),
            uploaded_at: now,
            updated_at: now,
            seq: 0,
            progress: 0,
            state: DocumentState::Uploading,
            history: vec![StatusChange {
                status: DocumentStatus::Uploading,
                at: now,
            }],
        }
    }

    pub fn status(&self) -> DocumentStatus {
        self.state.status()
    }

    /// Moves the document to `next`, returning the status it left.
    pub fn transition(&mut self, next: DocumentState) -> Result<DocumentStatus, DocumentError> {
        let from = self.status();
        let to = next.status();
        if !from.can_transition_to(to) {
            return Err(DocumentError::InvalidTransition {
                id: self.id,
                from,
                to,
            });
        }

        let now = Utc::now();
        if to == DocumentStatus::Queued {
            self.progress = 100;
        }
        self.state = next;
        self.updated_at = now;
        self.history.push(StatusChange { status: to, at: now });
        Ok(from)
    }

    /// Advances transfer progress. Returns the new value only if it moved forward.
    pub fn record_progress(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        if self.status() != DocumentStatus::Uploading || percent <= self.progress {
            return None;
        }
        self.progress = percent;
        self.updated_at = Utc::now();
        Some(percent)
    }

    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        match &self.state {
            DocumentState::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.state {
            DocumentState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<ScoreLabel> {
        self.outcome().map(|o| ScoreLabel::from_score(o.score))
    }
}

pub fn storage_key_for(id: DocumentId) -> String {
    format!("documents/{id}")
}

/// Full detail returned by `GET /api/v1/documents/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub progress: u8,
    pub upload_timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<ScoreLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<FailureReason>,
    pub history: Vec<StatusChange>,
}

impl DocumentView {
    pub fn new(doc: &Document, queue_position: Option<usize>) -> Self {
        let outcome = doc.outcome();
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            size_bytes: doc.size_bytes,
            mime_type: doc.mime_type.clone(),
            kind: doc.kind,
            status: doc.status(),
            progress: doc.progress,
            upload_timestamp: doc.uploaded_at,
            updated_at: doc.updated_at,
            queue_position,
            analysis_score: outcome.map(|o| o.score),
            label: doc.label(),
            feedback: outcome.map(|o| o.feedback.clone()),
            suggestions: outcome.map(|o| o.suggestions.clone()),
            error_reason: doc.failure().cloned(),
            history: doc.history.clone(),
        }
    }
}

/// Row returned by `GET /api/v1/documents`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub filename: String,
    pub size_bytes: u64,
    pub status: DocumentStatus,
    pub progress: u8,
    pub upload_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<ScoreLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<FailureReason>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            size_bytes: doc.size_bytes,
            status: doc.status(),
            progress: doc.progress,
            upload_timestamp: doc.uploaded_at,
            analysis_score: doc.outcome().map(|o| o.score),
            label: doc.label(),
            error_reason: doc.failure().cloned(),
        }
    }
}
