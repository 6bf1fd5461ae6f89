//! Assembly of the `/predict` response from a detection list.

use serde::Serialize;

use crate::classifier::{
    classify, recommendations, Stage, StageCounts, LOW_CONFIDENCE_RECOMMENDATION,
    LOW_CONFIDENCE_THRESHOLD,
};
use crate::detection::Detection;
use crate::ripeness::RipenessSummary;

/// Confidence/count pair for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryResult {
    pub confidence: f32,
    pub detections: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionCounts {
    pub flowers: usize,
    pub fruits: usize,
}

/// Result returned for a single analysed image. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub stage: Stage,
    pub confidence: f32,
    pub detections: Vec<Detection>,
    pub detection_counts: DetectionCounts,
    pub flowering_results: CategoryResult,
    pub fruiting_results: CategoryResult,
    pub health_summary: String,
    pub recommendations: Vec<String>,
    pub processing_time: f64,
    pub model_version: &'static str,
    #[serde(flatten)]
    pub ripeness: RipenessSummary,
}

impl AnalysisResult {
    /// Classify `detections` and build the full response.
    pub fn from_detections(
        detections: Vec<Detection>,
        processing_time: f64,
        model_version: &'static str,
    ) -> Self {
        let counts = StageCounts::tally(&detections);
        let decision = classify(&counts);

        let mut flowering_results = CategoryResult::default();
        let mut fruiting_results = CategoryResult::default();
        match decision.stage {
            Stage::Flowering => {
                flowering_results = CategoryResult {
                    confidence: round_to(decision.confidence, 3),
                    detections: counts.flower_count,
                };
            }
            Stage::Fruiting => {
                fruiting_results = CategoryResult {
                    confidence: round_to(decision.confidence, 3),
                    detections: counts.fruit_count,
                };
            }
            Stage::Vegetative | Stage::Unknown => {}
        }

        let mut advice = owned(recommendations(decision.stage));
        if decision.confidence < LOW_CONFIDENCE_THRESHOLD {
            advice.push(LOW_CONFIDENCE_RECOMMENDATION.to_string());
        }
        let ripeness = RipenessSummary::from_detections(&detections);

        Self {
            stage: decision.stage,
            confidence: round_to(decision.confidence, 3),
            detections,
            detection_counts: DetectionCounts {
                flowers: counts.flower_count,
                fruits: counts.fruit_count,
            },
            flowering_results,
            fruiting_results,
            health_summary: health_summary(decision.stage, &counts),
            recommendations: advice,
            processing_time: round_secs(processing_time),
            model_version,
            ripeness,
        }
    }

    /// Result for a detector response with nothing to interpret.
    pub fn unknown(processing_time: f64, model_version: &'static str) -> Self {
        Self {
            stage: Stage::Unknown,
            confidence: 0.0,
            detections: Vec::new(),
            detection_counts: DetectionCounts::default(),
            flowering_results: CategoryResult::default(),
            fruiting_results: CategoryResult::default(),
            health_summary: health_summary(Stage::Unknown, &StageCounts::default()),
            recommendations: owned(recommendations(Stage::Unknown)),
            processing_time: round_secs(processing_time),
            model_version,
            ripeness: RipenessSummary::empty(),
        }
    }
}

fn health_summary(stage: Stage, counts: &StageCounts) -> String {
    match stage {
        Stage::Vegetative => "Plant appears to be in vegetative growth stage".to_string(),
        Stage::Flowering => format!(
            "Detected {} flower(s) - plant is in flowering stage",
            counts.flower_count
        ),
        Stage::Fruiting => format!(
            "Detected {} fruit(s) - plant is in fruiting stage",
            counts.fruit_count
        ),
        Stage::Unknown => "Growth stage could not be determined from this image".to_string(),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn round_to(value: f32, places: i32) -> f32 {
    let factor = 10f32.powi(places);
    (value * factor).round() / factor
}

fn round_secs(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
