//! Roboflow hosted workflow client.
//!
//! Sends the image to `{api_url}/infer/workflows/{workspace}/{workflow_id}`
//! and interprets the predictions list of the workflow output. Workflows can
//! be configured in several ways on the Roboflow side, so the parser accepts
//! every response layout the service has been seen to return.

use std::sync::OnceLock;
use std::time::Duration;

use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use super::{Detector, DetectorError, DetectorInfo, ImageInput};
use crate::config::RoboflowConfig;
use crate::detection::{BoundingBox, Detection};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MODEL_VERSION: &str = "roboflow-v1";

/// Request body for the workflow inference endpoint.
#[derive(Serialize)]
struct WorkflowRequest<'a> {
    api_key: &'a str,
    inputs: WorkflowInputs,
    use_cache: bool,
}

#[derive(Serialize)]
struct WorkflowInputs {
    image: WorkflowImage,
}

#[derive(Serialize)]
struct WorkflowImage {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

/// Hosted workflow detector. The HTTP client is created on first use.
pub struct WorkflowDetector {
    config: RoboflowConfig,
    client: OnceLock<reqwest::blocking::Client>,
}

impl WorkflowDetector {
    pub fn new(config: RoboflowConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/infer/workflows/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.workspace,
            self.config.workflow_id
        )
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, DetectorError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DetectorError::HttpClient(e.to_string()))?;
        tracing::info!(
            workspace = %self.config.workspace,
            workflow = %self.config.workflow_id,
            "Roboflow client initialized"
        );
        Ok(self.client.get_or_init(|| client))
    }

    /// POST the image to the workflow and return the raw JSON response.
    fn run_workflow(&self, input: &ImageInput, use_cache: bool) -> Result<Value, DetectorError> {
        let image = match input {
            ImageInput::File(path) => {
                let bytes = std::fs::read(path)?;
                WorkflowImage {
                    kind: "base64",
                    value: base64::engine::general_purpose::STANDARD.encode(bytes),
                }
            }
            ImageInput::Url(url) => WorkflowImage {
                kind: "url",
                value: url.clone(),
            },
        };
        let body = WorkflowRequest {
            api_key: &self.config.api_key,
            inputs: WorkflowInputs { image },
            use_cache,
        };

        let url = self.endpoint();
        tracing::debug!(%url, %input, use_cache, "Sending workflow request");

        let response = self.client()?.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                DetectorError::Connection(self.config.api_url.clone())
            } else if e.is_timeout() {
                DetectorError::Timeout(REQUEST_TIMEOUT_SECS)
            } else {
                DetectorError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DetectorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .map_err(|e| DetectorError::ResponseParsing(e.to_string()))
    }
}

impl Detector for WorkflowDetector {
    fn detect(&self, input: &ImageInput) -> Result<Vec<Detection>, DetectorError> {
        let raw = self.run_workflow(input, true)?;
        let detections = parse_workflow_response(&raw)?;
        tracing::debug!(count = detections.len(), "Workflow predictions parsed");
        Ok(detections)
    }

    fn raw(&self, input: &ImageInput) -> Result<Value, DetectorError> {
        self.run_workflow(input, false)
    }

    fn info(&self) -> DetectorInfo {
        DetectorInfo::Workflow {
            service: "roboflow",
            workspace: self.config.workspace.clone(),
            workflow_id: self.config.workflow_id.clone(),
            api_url: self.config.api_url.clone(),
            client_initialized: self.is_ready(),
        }
    }

    fn is_ready(&self) -> bool {
        self.client.get().is_some()
    }

    fn model_version(&self) -> &'static str {
        MODEL_VERSION
    }
}

// ═══════════════════════════════════════════════════════════
// Response parsing
// ═══════════════════════════════════════════════════════════

/// Extract categorised detections from a workflow response.
///
/// An absent or empty outputs list is [`DetectorError::EmptyResponse`]. An
/// output entry without predictions yields no detections.
pub fn parse_workflow_response(raw: &Value) -> Result<Vec<Detection>, DetectorError> {
    let entry = first_output(raw).ok_or(DetectorError::EmptyResponse)?;
    Ok(predictions_of(entry)
        .map(|preds| preds.iter().map(parse_prediction).collect())
        .unwrap_or_default())
}

/// First workflow output entry, whichever envelope it arrived in.
fn first_output(raw: &Value) -> Option<&Value> {
    match raw {
        Value::Array(items) => items.first(),
        Value::Object(map) => match map.get("outputs") {
            Some(Value::Array(outputs)) => outputs.first(),
            Some(_) => None,
            None => Some(raw),
        },
        _ => None,
    }
}

fn predictions_of(entry: &Value) -> Option<&Vec<Value>> {
    predictions_field(entry).or_else(|| entry.get("output").and_then(predictions_field))
}

/// `predictions` as a list, or nested one level as `predictions.predictions`.
fn predictions_field(value: &Value) -> Option<&Vec<Value>> {
    match value.get("predictions")? {
        Value::Array(list) => Some(list),
        nested @ Value::Object(_) => nested.get("predictions")?.as_array(),
        _ => None,
    }
}

fn parse_prediction(pred: &Value) -> Detection {
    let class_name = pred
        .get("class")
        .or_else(|| pred.get("class_name"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let confidence = pred
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0) as f32;

    let num = |key: &str| pred.get(key).and_then(Value::as_f64).map(|v| v as f32);
    let bbox = match (num("x"), num("y"), num("width"), num("height")) {
        (Some(x), Some(y), Some(w), Some(h)) => Some(BoundingBox::from_center(x, y, w, h)),
        _ => None,
    };

    Detection::classified(class_name, confidence, bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Category;
    use serde_json::json;

    fn prediction(class: &str, confidence: f64) -> Value {
        json!({
            "class": class,
            "confidence": confidence,
            "x": 100.0, "y": 80.0, "width": 20.0, "height": 10.0
        })
    }

    #[test]
    fn parses_outputs_nested_predictions() {
        let raw = json!({
            "outputs": [{
                "predictions": {
                    "image": {"width": 640, "height": 480},
                    "predictions": [prediction("flower", 0.91), prediction("b_green", 0.4)]
                }
            }]
        });
        let dets = parse_workflow_response(&raw).unwrap();
        assert_eq!(dets.len(), 2);
        assert!(dets.iter().all(|d| d.category == Some(Category::Flower)));
        let bbox = dets[0].bbox.unwrap();
        assert_eq!(bbox.x1, 90.0);
        assert_eq!(bbox.y2, 85.0);
    }

    #[test]
    fn parses_outputs_flat_predictions() {
        let raw = json!({"outputs": [{"predictions": [prediction("Tomato", 0.7)]}]});
        let dets = parse_workflow_response(&raw).unwrap();
        assert_eq!(dets[0].class_name, "tomato");
        assert_eq!(dets[0].category, Some(Category::Fruit));
    }

    #[test]
    fn parses_sdk_list_with_output_key() {
        let raw = json!([{"output": {"predictions": [prediction("fully_ripened", 0.8)]}}]);
        let dets = parse_workflow_response(&raw).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].category, Some(Category::Fruit));
    }

    #[test]
    fn parses_sdk_list_with_top_level_predictions() {
        let raw = json!([{"predictions": [prediction("bloom", 0.6)]}]);
        let dets = parse_workflow_response(&raw).unwrap();
        assert_eq!(dets[0].category, Some(Category::Flower));
    }

    #[test]
    fn accepts_class_name_field_and_missing_box() {
        let raw = json!({"predictions": [{"class_name": "Berry", "confidence": 0.5}]});
        let dets = parse_workflow_response(&raw).unwrap();
        assert_eq!(dets[0].class_name, "berry");
        assert!(dets[0].bbox.is_none());
    }

    #[test]
    fn empty_outputs_is_empty_response() {
        assert!(matches!(
            parse_workflow_response(&json!([])),
            Err(DetectorError::EmptyResponse)
        ));
        assert!(matches!(
            parse_workflow_response(&json!({"outputs": []})),
            Err(DetectorError::EmptyResponse)
        ));
        assert!(matches!(
            parse_workflow_response(&json!("nonsense")),
            Err(DetectorError::EmptyResponse)
        ));
    }

    #[test]
    fn output_without_predictions_has_no_detections() {
        let raw = json!([{"count_objects": 0}]);
        assert!(parse_workflow_response(&raw).unwrap().is_empty());
    }

    #[test]
    fn endpoint_joins_workspace_and_workflow() {
        let detector = WorkflowDetector::new(RoboflowConfig {
            api_url: "https://detect.example.com/".into(),
            workspace: "ws".into(),
            workflow_id: "wf".into(),
            ..RoboflowConfig::default()
        });
        assert_eq!(
            detector.endpoint(),
            "https://detect.example.com/infer/workflows/ws/wf"
        );
        assert!(!detector.is_ready());
    }

    // ── Against a local stand-in for the hosted API ─────────

    async fn spawn_fake_workflow_api(response: Value) -> std::net::SocketAddr {
        use axum::routing::post;
        use axum::{Json, Router};

        let app = Router::new().route(
            "/infer/workflows/:workspace/:workflow",
            post(move |Json(body): Json<Value>| {
                let response = response.clone();
                async move {
                    if body["api_key"] != "test-key" {
                        return (
                            axum::http::StatusCode::UNAUTHORIZED,
                            Json(json!({"error": "bad key"})),
                        );
                    }
                    assert_eq!(body["inputs"]["image"]["type"], "base64");
                    (axum::http::StatusCode::OK, Json(response))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn test_config(addr: std::net::SocketAddr, api_key: &str) -> RoboflowConfig {
        RoboflowConfig {
            api_key: api_key.into(),
            workspace: "ws".into(),
            workflow_id: "wf".into(),
            api_url: format!("http://{addr}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detect_round_trips_through_http() {
        let addr = spawn_fake_workflow_api(json!({
            "outputs": [{"predictions": {"predictions": [prediction("flower", 0.88)]}}]
        }))
        .await;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("plant.jpg");
        std::fs::write(&image, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let result = tokio::task::spawn_blocking(move || {
            let detector = WorkflowDetector::new(test_config(addr, "test-key"));
            let dets = detector.detect(&ImageInput::File(image));
            (dets, detector.is_ready())
        })
        .await
        .unwrap();

        let (dets, ready) = result;
        let dets = dets.unwrap();
        assert!(ready);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].category, Some(Category::Flower));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn api_error_status_is_reported() {
        let addr = spawn_fake_workflow_api(json!({})).await;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("plant.png");
        std::fs::write(&image, [0x89, 0x50, 0x4E, 0x47]).unwrap();

        let err = tokio::task::spawn_blocking(move || {
            WorkflowDetector::new(test_config(addr, "wrong-key"))
                .detect(&ImageInput::File(image))
                .unwrap_err()
        })
        .await
        .unwrap();

        match err {
            DetectorError::Api { status, .. } => assert_eq!(status, 401),
            other => panic!("unexpected error: {other}"),
        }
    }
}
