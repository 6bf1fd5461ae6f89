//! Shared state for the API layer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ServiceConfig;
use crate::detector::Detector;
use crate::service::AnalysisService;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub service: AnalysisService,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub started_at: Instant,
}

impl ApiContext {
    pub fn new(detector: Arc<dyn Detector>, config: &ServiceConfig) -> Self {
        Self {
            service: AnalysisService::new(detector),
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            started_at: Instant::now(),
        }
    }

    pub fn detector(&self) -> &Arc<dyn Detector> {
        self.service.detector()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
