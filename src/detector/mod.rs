//! Object-detector backends.
//!
//! Detection itself is delegated: either to a hosted Roboflow workflow
//! (`remote`) or to local flower/fruit ONNX models (`onnx`, behind the
//! `onnx-detector` feature). Every backend implements [`Detector`] so the
//! analysis service can take it as an injected dependency.

pub mod mock;
#[cfg(feature = "onnx-detector")]
pub mod onnx;
pub mod remote;
pub mod yolo;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::{DetectorBackend, ServiceConfig};
use crate::detection::Detection;

pub use mock::MockDetector;
pub use remote::WorkflowDetector;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Cannot connect to inference API at {0}")]
    Connection(String),

    #[error("Inference API returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Inference request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Empty or invalid result from detector")]
    EmptyResponse,

    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialisation failed: {0}")]
    ModelInit(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Input not supported by this detector: {0}")]
    UnsupportedInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image handed to a detector.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Staged file on local disk.
    File(PathBuf),
    /// Publicly reachable image URL (remote backends only).
    Url(String),
}

impl std::fmt::Display for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Status of one model file for the local backend.
#[derive(Debug, Clone, Serialize)]
pub struct ModelFileInfo {
    pub path: String,
    pub exists: bool,
    pub loaded: bool,
}

/// Serializable backend description for the info/health endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DetectorInfo {
    Workflow {
        service: &'static str,
        workspace: String,
        workflow_id: String,
        api_url: String,
        client_initialized: bool,
    },
    Models {
        service: &'static str,
        flower_model: ModelFileInfo,
        fruit_model: ModelFileInfo,
    },
    Mock {
        service: &'static str,
    },
}

impl DetectorInfo {
    pub fn service(&self) -> &'static str {
        match self {
            Self::Workflow { service, .. }
            | Self::Models { service, .. }
            | Self::Mock { service } => service,
        }
    }
}

/// A blocking object detector.
///
/// Calls may do network or CPU-heavy work; callers on an async runtime run
/// them via `spawn_blocking`.
pub trait Detector: Send + Sync {
    /// Run inference and return categorised detections.
    fn detect(&self, input: &ImageInput) -> Result<Vec<Detection>, DetectorError>;

    /// Un-interpreted backend output, for diagnostics.
    fn raw(&self, input: &ImageInput) -> Result<serde_json::Value, DetectorError> {
        let detections = self.detect(input)?;
        serde_json::to_value(detections).map_err(|e| DetectorError::ResponseParsing(e.to_string()))
    }

    fn info(&self) -> DetectorInfo;

    /// Client initialised / models loaded.
    fn is_ready(&self) -> bool;

    /// Identifier reported as `model_version` in analysis results.
    fn model_version(&self) -> &'static str;
}

/// Build the detector selected by configuration.
pub fn from_config(config: &ServiceConfig) -> Result<Arc<dyn Detector>, DetectorError> {
    match config.backend {
        DetectorBackend::Roboflow => {
            if config.roboflow.api_key.is_empty() {
                tracing::warn!("ROBOFLOW_API_KEY is not set; workflow requests will be rejected");
            }
            Ok(Arc::new(WorkflowDetector::new(config.roboflow.clone())))
        }
        #[cfg(feature = "onnx-detector")]
        DetectorBackend::Onnx => {
            let detector = onnx::YoloDetector::new(onnx::ModelPaths::from_config(config));
            if let Err(e) = detector.preload() {
                // Loading is retried on the first request.
                tracing::warn!("ONNX models not loaded at startup: {e}");
            }
            Ok(Arc::new(detector))
        }
        #[cfg(not(feature = "onnx-detector"))]
        DetectorBackend::Onnx => Err(DetectorError::ModelInit(
            "built without the `onnx-detector` feature".into(),
        )),
    }
}
