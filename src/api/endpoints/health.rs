//! Liveness endpoints: service banner, health check and smoke test.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::config::{APP_NAME, APP_VERSION};
use crate::detector::DetectorInfo;

#[derive(Serialize)]
pub struct BannerResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub detector_ready: bool,
    pub uptime_secs: u64,
    pub detector: DetectorInfo,
}

#[derive(Serialize)]
pub struct SmokeTestResponse {
    pub message: String,
    pub status: &'static str,
    pub timestamp: String,
}

/// `GET /`: the keep-alive pinger's second target.
pub async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        service: APP_NAME,
        version: APP_VERSION,
        status: "ok",
    })
}

/// `GET /health`
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let detector = ctx.detector();
    Json(HealthResponse {
        status: "ok",
        service: APP_NAME,
        version: APP_VERSION,
        detector_ready: detector.is_ready(),
        uptime_secs: ctx.uptime_secs(),
        detector: detector.info(),
    })
}

/// `GET /test`
pub async fn smoke_test() -> Json<SmokeTestResponse> {
    Json(SmokeTestResponse {
        message: format!("{APP_NAME} API is working!"),
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
