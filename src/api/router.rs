//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//!
//! Layer stack (outermost → innermost):
//! 1. CORS → 2. Access log → 3. Body limit

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// Handlers use `State<ApiContext>`; `.with_state()` converts
/// `Router<ApiContext>` → `Router<()>` before the layers are applied.
pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.max_upload_bytes;

    Router::new()
        .route("/", get(endpoints::health::banner))
        .route("/health", get(endpoints::health::check))
        .route("/test", get(endpoints::health::smoke_test))
        .route("/predict", post(endpoints::predict::predict))
        .route("/models/info", get(endpoints::info::detector_info))
        .route("/workflow/info", get(endpoints::info::detector_info))
        .route("/test-workflow", post(endpoints::diagnostics::test_workflow))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::log_access))
        .layer(CorsLayer::permissive())
}
