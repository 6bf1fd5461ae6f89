//! Per-class tally, tomato ripeness counts and a yield/earnings estimate.
//!
//! Tomato workflows report ripeness through the class name (`fully_ripened`,
//! `half_ripened`, `green`, and `b_green` for buds). Class names are compared
//! lower-cased. Flowers and buds carry no yield.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::detection::Detection;

/// Estimated weight of one fully ripened tomato, in kg.
pub const FULLY_RIPENED_KG: f64 = 0.1;
/// Estimated weight of one half ripened tomato, in kg.
pub const HALF_RIPENED_KG: f64 = 0.08;
/// Estimated weight of one green tomato, in kg.
pub const GREEN_KG: f64 = 0.05;
/// Market price used for the earnings estimate, per kg.
pub const MARKET_PRICE_PER_KG: f64 = 5.0;

/// Overall stage reported when there are no detections.
pub const UNKNOWN_OVERALL_STAGE: &str = "unknown";

const BUD_CLASS: &str = "b_green";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ripeness {
    FullyRipened,
    HalfRipened,
    Green,
}

fn ripeness_of(class_name: &str) -> Option<Ripeness> {
    if class_name.contains("fully_ripened") {
        Some(Ripeness::FullyRipened)
    } else if class_name.contains("half_ripened") {
        Some(Ripeness::HalfRipened)
    } else if class_name.contains("green") && class_name != BUD_CLASS {
        Some(Ripeness::Green)
    } else {
        None
    }
}

/// Overall stage label for the most frequent class.
fn overall_stage_of(class_name: &str) -> String {
    let label = match ripeness_of(class_name) {
        Some(Ripeness::FullyRipened) => "fully_ripened",
        Some(Ripeness::HalfRipened) => "half_ripened",
        Some(Ripeness::Green) => "green",
        None if class_name.contains("flower") || class_name == BUD_CLASS => "flower",
        None => class_name,
    };
    label.to_string()
}

/// Ripeness part of the `/predict` response. Keys are camelCase, as the web
/// client reads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RipenessSummary {
    pub class_counts: BTreeMap<String, usize>,
    pub overall_stage: String,
    pub fully_ripened_count: usize,
    pub half_ripened_count: usize,
    pub green_count: usize,
    pub yield_kg: f64,
    pub estimated_earnings: f64,
    pub market_price_per_kg: f64,
}

impl RipenessSummary {
    /// Tally `detections` by lower-cased class name.
    ///
    /// The overall stage comes from the most frequent class. On a tie the
    /// class seen first in `detections` wins.
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut tally: Vec<(String, usize)> = Vec::new();
        for detection in detections {
            let name = detection.class_name.to_lowercase();
            match tally.iter_mut().find(|(seen, _)| *seen == name) {
                Some((_, count)) => *count += 1,
                None => tally.push((name, 1)),
            }
        }

        let mut most_frequent: Option<&(String, usize)> = None;
        for entry in &tally {
            if most_frequent.map_or(true, |best| entry.1 > best.1) {
                most_frequent = Some(entry);
            }
        }
        let overall_stage = most_frequent
            .map(|(name, _)| overall_stage_of(name))
            .unwrap_or_else(|| UNKNOWN_OVERALL_STAGE.to_string());

        let (mut fully, mut half, mut green) = (0usize, 0usize, 0usize);
        for (name, count) in &tally {
            match ripeness_of(name) {
                Some(Ripeness::FullyRipened) => fully += *count,
                Some(Ripeness::HalfRipened) => half += *count,
                Some(Ripeness::Green) => green += *count,
                None => {}
            }
        }

        let yield_kg = fully as f64 * FULLY_RIPENED_KG
            + half as f64 * HALF_RIPENED_KG
            + green as f64 * GREEN_KG;
        let estimated_earnings = yield_kg * MARKET_PRICE_PER_KG;

        Self {
            class_counts: tally.into_iter().collect(),
            overall_stage,
            fully_ripened_count: fully,
            half_ripened_count: half,
            green_count: green,
            yield_kg: round_places(yield_kg, 3),
            estimated_earnings: round_places(estimated_earnings, 2),
            market_price_per_kg: MARKET_PRICE_PER_KG,
        }
    }

    /// Summary with no detections: empty counts, `unknown` stage, zero yield.
    pub fn empty() -> Self {
        Self::from_detections(&[])
    }
}

fn round_places(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
