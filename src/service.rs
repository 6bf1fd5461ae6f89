//! Analysis service: runs the injected detector off the async runtime and
//! turns its output into an [`AnalysisResult`].

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::detector::{Detector, DetectorError, ImageInput};
use crate::upload::StagedUpload;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Analysis error: {0}")]
    Detector(#[from] DetectorError),
    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

/// Raw detector output for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub processing_time: f64,
    pub raw_result: serde_json::Value,
    pub result_length: usize,
}

#[derive(Clone)]
pub struct AnalysisService {
    detector: Arc<dyn Detector>,
}

impl AnalysisService {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &Arc<dyn Detector> {
        &self.detector
    }

    /// Analyse a staged upload. The upload is consumed and its file deleted
    /// when the worker finishes, whatever the outcome.
    pub async fn analyze(&self, staged: StagedUpload) -> Result<AnalysisResult, ServiceError> {
        let detector = self.detector.clone();
        let model_version = detector.model_version();

        let (outcome, elapsed) = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let input = ImageInput::File(staged.to_path_buf());
            let outcome = detector.detect(&input);
            let elapsed = start.elapsed().as_secs_f64();
            drop(staged);
            (outcome, elapsed)
        })
        .await
        .map_err(|e| ServiceError::Worker(e.to_string()))?;

        match outcome {
            Ok(detections) => {
                let result = AnalysisResult::from_detections(detections, elapsed, model_version);
                tracing::info!(
                    stage = %result.stage,
                    confidence = result.confidence,
                    flowers = result.detection_counts.flowers,
                    fruits = result.detection_counts.fruits,
                    overall_stage = %result.ripeness.overall_stage,
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Analysis complete"
                );
                Ok(result)
            }
            Err(DetectorError::EmptyResponse) => {
                tracing::warn!("Empty or invalid result from detector");
                Ok(AnalysisResult::unknown(elapsed, model_version))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run the detector without interpretation (and without response caching
    /// on backends that have one).
    pub async fn probe(
        &self,
        input: ImageInput,
        staged: Option<StagedUpload>,
    ) -> Result<ProbeResult, ServiceError> {
        let detector = self.detector.clone();

        let (outcome, elapsed) = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let outcome = detector.raw(&input);
            let elapsed = start.elapsed().as_secs_f64();
            drop(staged);
            (outcome, elapsed)
        })
        .await
        .map_err(|e| ServiceError::Worker(e.to_string()))?;

        let raw_result = outcome?;
        let result_length = match &raw_result {
            serde_json::Value::Array(items) => items.len(),
            serde_json::Value::Object(map) => map.len(),
            _ => 0,
        };
        tracing::info!(elapsed_ms = (elapsed * 1000.0) as u64, "Workflow probe complete");

        Ok(ProbeResult {
            success: true,
            processing_time: (elapsed * 100.0).round() / 100.0,
            raw_result,
            result_length,
        })
    }
}
