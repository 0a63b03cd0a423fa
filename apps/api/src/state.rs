use std::sync::Arc;

use crate::config::Config;
use crate::documents::service::DocumentService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub config: Config,
}
