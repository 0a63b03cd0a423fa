pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::documents::handlers;
use crate::documents::validation::MAX_UPLOAD_BYTES;
use crate::errors::AppError;
use crate::state::AppState;

async fn not_implemented() -> Result<(), AppError> {
    Err(AppError::NotImplemented)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/documents",
            post(handlers::handle_submit).get(handlers::handle_list),
        )
        .route("/api/v1/documents/stats", get(handlers::handle_stats))
        .route(
            "/api/v1/documents/:id",
            get(handlers::handle_get).delete(handlers::handle_delete),
        )
        .route(
            "/api/v1/documents/:id/progress",
            get(handlers::handle_progress),
        )
        .route(
            "/api/v1/documents/:id/cancel",
            post(handlers::handle_cancel),
        )
        // Downloadable report
        .route("/api/v1/documents/:id/report", get(not_implemented))
        // Backstop only; submit stops reading once a file passes the upload limit.
        .layer(DefaultBodyLimit::max(2 * MAX_UPLOAD_BYTES as usize))
        .with_state(state)
}
