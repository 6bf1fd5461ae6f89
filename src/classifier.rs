//! Growth-stage classification over flower/fruit detection tallies.
//!
//! The decision is a priority rule over two counts and their confidence maxima:
//! no evidence means vegetative, otherwise the category with more detections
//! wins. Equal non-zero counts resolve toward flowering.

use serde::{Deserialize, Serialize};

use crate::detection::{Category, Detection};

/// Confidence reported when nothing flower- or fruit-like was detected.
pub const VEGETATIVE_CONFIDENCE: f32 = 0.5;

/// Derived growth phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Vegetative,
    Flowering,
    Fruiting,
    /// Detector answered with nothing interpretable.
    Unknown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vegetative => write!(f, "vegetative"),
            Self::Flowering => write!(f, "flowering"),
            Self::Fruiting => write!(f, "fruiting"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Per-category detection counts and maximum confidences.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageCounts {
    pub flower_count: usize,
    pub fruit_count: usize,
    pub flower_max: f32,
    pub fruit_max: f32,
}

impl StageCounts {
    /// Tally categorised detections. Uncategorised ones are ignored.
    pub fn tally(detections: &[Detection]) -> Self {
        detections
            .iter()
            .fold(Self::default(), |mut acc, d| {
                match d.category {
                    Some(Category::Flower) => {
                        acc.flower_count += 1;
                        acc.flower_max = acc.flower_max.max(d.confidence);
                    }
                    Some(Category::Fruit) => {
                        acc.fruit_count += 1;
                        acc.fruit_max = acc.fruit_max.max(d.confidence);
                    }
                    None => {}
                }
                acc
            })
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDecision {
    pub stage: Stage,
    pub confidence: f32,
}

/// Pick the growth stage for a set of tallies.
pub fn classify(counts: &StageCounts) -> StageDecision {
    if counts.flower_count == 0 && counts.fruit_count == 0 {
        return StageDecision {
            stage: Stage::Vegetative,
            confidence: VEGETATIVE_CONFIDENCE,
        };
    }

    if counts.flower_count >= counts.fruit_count {
        StageDecision {
            stage: Stage::Flowering,
            confidence: counts.flower_max,
        }
    } else {
        StageDecision {
            stage: Stage::Fruiting,
            confidence: counts.fruit_max,
        }
    }
}

const VEGETATIVE_RECOMMENDATIONS: &[&str] = &[
    "Plant appears to be in vegetative stage",
    "Continue regular watering and fertilization",
    "Apply balanced NPK fertilizer",
    "Monitor leaf health and early signs of flowering",
];

const FLOWERING_RECOMMENDATIONS: &[&str] = &[
    "Ensure adequate pollination (bees, hand pollination)",
    "Maintain consistent watering - avoid water stress",
    "Monitor for pests on flowers (aphids, thrips)",
    "Avoid excessive nitrogen - promote flower development",
];

const FRUITING_RECOMMENDATIONS: &[&str] = &[
    "Increase watering as fruits develop",
    "Apply potassium-rich fertilizer (promotes fruit quality)",
    "Support heavy fruit-bearing branches if needed",
    "Monitor for fruit flies and diseases",
];

const UNKNOWN_RECOMMENDATIONS: &[&str] = &[
    "No detections found in the image",
    "Try uploading a clearer image of the plant",
];

/// Stage confidence below which the image is flagged for a retake.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

pub const LOW_CONFIDENCE_RECOMMENDATION: &str =
    "Low confidence detection - consider retaking the image";

/// Fixed care recommendations for a stage.
pub fn recommendations(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Vegetative => VEGETATIVE_RECOMMENDATIONS,
        Stage::Flowering => FLOWERING_RECOMMENDATIONS,
        Stage::Fruiting => FRUITING_RECOMMENDATIONS,
        Stage::Unknown => UNKNOWN_RECOMMENDATIONS,
    }
}
