use thiserror::Error;

use crate::documents::models::{DocumentId, DocumentStatus};
use crate::documents::validation::ValidationError;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document {0} not found")]
    NotFound(DocumentId),

    #[error("Document {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
