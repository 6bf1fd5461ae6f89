//! Local flower/fruit detector on ONNX Runtime.
//!
//! Two single-purpose YOLO models: every detection from the flower model is
//! flower evidence and every detection from the fruit model is fruit
//! evidence, whatever class names the models carry. A model that has not been
//! trained yet can be replaced by a generic `yolov8n.onnx` placeholder.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::GenericImageView;
use ort::session::Session;

use super::yolo::{decode_output, non_max_suppression, parse_class_names, rescale, YoloParams};
use super::{Detector, DetectorError, DetectorInfo, ImageInput, ModelFileInfo};
use crate::config::ServiceConfig;
use crate::detection::{Category, Detection};

const MODEL_VERSION: &str = "yolo-onnx-v1";

#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub flower: PathBuf,
    pub fruit: PathBuf,
    pub fallback: PathBuf,
}

impl ModelPaths {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            flower: config.flower_model_path(),
            fruit: config.fruit_model_path(),
            fallback: config.fallback_model_path(),
        }
    }
}

/// One loaded session plus its class names.
///
/// `Session::run` requires `&mut self`, hence the Mutex.
struct LoadedModel {
    session: Mutex<Session>,
    names: Vec<String>,
    category: Category,
}

struct LoadedModels {
    flower: LoadedModel,
    fruit: LoadedModel,
}

pub struct YoloDetector {
    paths: ModelPaths,
    params: YoloParams,
    models: Mutex<Option<Arc<LoadedModels>>>,
}

impl YoloDetector {
    pub fn new(paths: ModelPaths) -> Self {
        Self::with_params(paths, YoloParams::default())
    }

    pub fn with_params(paths: ModelPaths, params: YoloParams) -> Self {
        Self {
            paths,
            params,
            models: Mutex::new(None),
        }
    }

    /// Load both models now instead of on the first request.
    pub fn preload(&self) -> Result<(), DetectorError> {
        self.models().map(|_| ())
    }

    fn models(&self) -> Result<Arc<LoadedModels>, DetectorError> {
        let mut guard = self
            .models
            .lock()
            .map_err(|_| DetectorError::ModelInit("model lock poisoned".into()))?;
        if let Some(models) = guard.as_ref() {
            return Ok(models.clone());
        }

        let flower = load_model(
            &resolve_model_path(&self.paths.flower, &self.paths.fallback)?,
            Category::Flower,
        )?;
        let fruit = load_model(
            &resolve_model_path(&self.paths.fruit, &self.paths.fallback)?,
            Category::Fruit,
        )?;
        tracing::info!("Flower and fruit models loaded");

        let models = Arc::new(LoadedModels { flower, fruit });
        *guard = Some(models.clone());
        Ok(models)
    }

    fn run_model(
        &self,
        model: &LoadedModel,
        input: &ndarray::Array4<f32>,
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, DetectorError> {
        use ort::value::TensorRef;

        let tensor = TensorRef::from_array_view(input)
            .map_err(|e| DetectorError::Inference(e.to_string()))?;

        let (dims, data) = {
            let mut session = model
                .session
                .lock()
                .map_err(|_| DetectorError::Inference("Session lock poisoned".into()))?;
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| DetectorError::Inference(format!("ONNX inference failed: {e}")))?;
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::Inference(format!("Output extraction: {e}")))?;
            let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
            (dims, data.to_vec())
        };

        let candidates = decode_output(&data, &dims, self.params.conf_threshold)
            .map_err(DetectorError::Inference)?;
        let kept = non_max_suppression(
            candidates,
            self.params.iou_threshold,
            self.params.max_detections,
        );

        Ok(kept
            .into_iter()
            .map(|b| {
                let name = model
                    .names
                    .get(b.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", b.class_id));
                Detection::with_category(
                    name,
                    b.confidence,
                    Some(rescale(b.bbox, self.params.input_size, width, height)),
                    model.category,
                )
            })
            .collect())
    }

    fn model_info(&self, path: &Path, loaded: bool) -> ModelFileInfo {
        ModelFileInfo {
            path: path.display().to_string(),
            exists: path.exists(),
            loaded,
        }
    }
}

impl Detector for YoloDetector {
    fn detect(&self, input: &ImageInput) -> Result<Vec<Detection>, DetectorError> {
        let path = match input {
            ImageInput::File(path) => path,
            ImageInput::Url(url) => {
                return Err(DetectorError::UnsupportedInput(format!(
                    "local models take files, not URLs ({url})"
                )))
            }
        };

        let models = self.models()?;
        let (tensor, width, height) = preprocess(path, self.params.input_size)?;

        let mut detections = self.run_model(&models.flower, &tensor, width, height)?;
        let fruits = self.run_model(&models.fruit, &tensor, width, height)?;
        tracing::debug!(
            flowers = detections.len(),
            fruits = fruits.len(),
            "Local inference complete"
        );
        detections.extend(fruits);
        Ok(detections)
    }

    fn info(&self) -> DetectorInfo {
        let loaded = self.is_ready();
        DetectorInfo::Models {
            service: "yolo-onnx",
            flower_model: self.model_info(&self.paths.flower, loaded),
            fruit_model: self.model_info(&self.paths.fruit, loaded),
        }
    }

    fn is_ready(&self) -> bool {
        self.models.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    fn model_version(&self) -> &'static str {
        MODEL_VERSION
    }
}

/// Trained model if present, otherwise the generic placeholder.
fn resolve_model_path(preferred: &Path, fallback: &Path) -> Result<PathBuf, DetectorError> {
    if preferred.exists() {
        return Ok(preferred.to_path_buf());
    }
    if fallback.exists() {
        tracing::warn!(
            missing = %preferred.display(),
            placeholder = %fallback.display(),
            "Trained model not found, using placeholder"
        );
        return Ok(fallback.to_path_buf());
    }
    Err(DetectorError::ModelNotFound(preferred.to_path_buf()))
}

fn load_model(path: &Path, category: Category) -> Result<LoadedModel, DetectorError> {
    let session = Session::builder()
        .map_err(|e: ort::Error| DetectorError::ModelInit(e.to_string()))?
        .with_intra_threads(2)
        .map_err(|e: ort::Error| DetectorError::ModelInit(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e: ort::Error| DetectorError::ModelInit(format!("ONNX load failed: {e}")))?;

    let names = match std::fs::read_to_string(path.with_extension("names")) {
        Ok(text) => parse_class_names(&text),
        Err(_) => Vec::new(),
    };

    tracing::info!(path = %path.display(), classes = names.len(), "ONNX model loaded");

    Ok(LoadedModel {
        session: Mutex::new(session),
        names,
        category,
    })
}

/// Resize to the square model input and lay out as `[1, 3, size, size]`
/// RGB in `[0, 1]`. Returns the tensor and the source dimensions.
fn preprocess(path: &Path, size: u32) -> Result<(ndarray::Array4<f32>, u32, u32), DetectorError> {
    let img = image::open(path).map_err(|e| DetectorError::ImageDecode(e.to_string()))?;
    let (width, height) = img.dimensions();

    let rgb = img
        .resize_exact(size, size, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let side = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }
    Ok((tensor, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_trained_model() {
        let dir = tempfile::tempdir().unwrap();
        let trained = dir.path().join("flower_model.onnx");
        let fallback = dir.path().join("yolov8n.onnx");
        std::fs::write(&trained, b"x").unwrap();
        std::fs::write(&fallback, b"x").unwrap();
        assert_eq!(resolve_model_path(&trained, &fallback).unwrap(), trained);
    }

    #[test]
    fn resolve_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let trained = dir.path().join("fruit_model.onnx");
        let fallback = dir.path().join("yolov8n.onnx");
        std::fs::write(&fallback, b"x").unwrap();
        assert_eq!(resolve_model_path(&trained, &fallback).unwrap(), fallback);
    }

    #[test]
    fn resolve_without_any_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_model_path(
            &dir.path().join("flower_model.onnx"),
            &dir.path().join("yolov8n.onnx"),
        )
        .unwrap_err();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }

    #[test]
    fn missing_models_leave_detector_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let detector = YoloDetector::new(ModelPaths {
            flower: dir.path().join("flower_model.onnx"),
            fruit: dir.path().join("fruit_model.onnx"),
            fallback: dir.path().join("yolov8n.onnx"),
        });
        assert!(detector.preload().is_err());
        assert!(!detector.is_ready());
        match detector.info() {
            DetectorInfo::Models { flower_model, .. } => {
                assert!(!flower_model.exists);
                assert!(!flower_model.loaded);
            }
            _ => panic!("expected model info"),
        }
    }

    #[test]
    fn urls_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let detector = YoloDetector::new(ModelPaths {
            flower: dir.path().join("a.onnx"),
            fruit: dir.path().join("b.onnx"),
            fallback: dir.path().join("c.onnx"),
        });
        let err = detector
            .detect(&ImageInput::Url("http://example.invalid/p.jpg".into()))
            .unwrap_err();
        assert!(matches!(err, DetectorError::UnsupportedInput(_)));
    }
}
