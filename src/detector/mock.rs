use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Detector, DetectorError, DetectorInfo, ImageInput};
use crate::detection::Detection;

/// Mock detector for testing. Returns configured detections or a fixed error.
pub struct MockDetector {
    detections: Vec<Detection>,
    failure: Option<fn() -> DetectorError>,
    calls: AtomicUsize,
    last_input: Mutex<Option<String>>,
}

impl MockDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            failure: None,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    /// Detector whose every call fails with the error `make` builds.
    pub fn failing(make: fn() -> DetectorError) -> Self {
        Self {
            failure: Some(make),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Display form of the input seen by the most recent call.
    pub fn last_input(&self) -> Option<String> {
        self.last_input.lock().ok()?.clone()
    }
}

impl Detector for MockDetector {
    fn detect(&self, input: &ImageInput) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_input.lock() {
            *last = Some(input.to_string());
        }
        if let ImageInput::File(path) = input {
            if !path.exists() {
                return Err(DetectorError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )));
            }
        }
        match self.failure {
            Some(make) => Err(make()),
            None => Ok(self.detections.clone()),
        }
    }

    fn info(&self) -> DetectorInfo {
        DetectorInfo::Mock { service: "mock" }
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn model_version(&self) -> &'static str {
        "mock-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_detections() {
        let detector = MockDetector::new(vec![Detection::classified("flower", 0.7, None)]);
        let out = detector
            .detect(&ImageInput::Url("http://example.invalid/x.png".into()))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(detector.calls(), 1);
        assert_eq!(
            detector.last_input().as_deref(),
            Some("http://example.invalid/x.png")
        );
    }

    #[test]
    fn failing_mock_returns_error() {
        let detector = MockDetector::failing(|| DetectorError::Inference("boom".into()));
        let err = detector
            .detect(&ImageInput::Url("http://example.invalid/x.png".into()))
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn mock_rejects_missing_file() {
        let detector = MockDetector::new(vec![]);
        let err = detector
            .detect(&ImageInput::File("/definitely/not/here.png".into()))
            .unwrap_err();
        assert!(matches!(err, DetectorError::Io(_)));
    }
}
