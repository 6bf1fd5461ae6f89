//! Detector info endpoints: which backend is configured and whether its
//! client or models are loaded.

use axum::extract::State;
use axum::Json;

use crate::api::types::ApiContext;
use crate::detector::DetectorInfo;

/// `GET /models/info` and `GET /workflow/info`.
pub async fn detector_info(State(ctx): State<ApiContext>) -> Json<DetectorInfo> {
    Json(ctx.detector().info())
}
