//! Detection records returned by every detector backend.

use serde::{Deserialize, Serialize};

/// Which growth-stage evidence a detection counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Flower,
    Fruit,
}

/// Axis-aligned box in source-image pixels, corner format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build from centre/size format (Roboflow and raw YOLO output).
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        }
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One output record from a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bbox: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<Category>,
}

impl Detection {
    /// Detection categorised from its class name.
    pub fn classified(class_name: &str, confidence: f32, bbox: Option<BoundingBox>) -> Self {
        let class_name = class_name.to_lowercase();
        let category = categorize_lowercase(&class_name);
        Self {
            class_name,
            confidence,
            bbox,
            category,
        }
    }

    /// Detection with an explicit category (e.g. from a single-purpose model).
    pub fn with_category(
        class_name: impl Into<String>,
        confidence: f32,
        bbox: Option<BoundingBox>,
        category: Category,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
            category: Some(category),
        }
    }
}

const FLOWER_KEYWORDS: &[&str] = &["flower", "bloom", "blossom"];
const FRUIT_KEYWORDS: &[&str] = &[
    "fruit", "berry", "pod", "apple", "tomato", "ripened", "half", "fully",
];

/// Tomato bud class. Contains "green" but is a flower stage.
const BUD_CLASS: &str = "b_green";

/// Map a class name of any case onto a category.
///
/// Flower keywords win over fruit keywords. `b_green` is a bud; any other
/// class containing `green` is an unripe fruit.
pub fn categorize_class(class_name: &str) -> Option<Category> {
    categorize_lowercase(&class_name.to_lowercase())
}

/// [`categorize_class`] for a name that is already lower-case.
fn categorize_lowercase(name: &str) -> Option<Category> {
    if name == BUD_CLASS || FLOWER_KEYWORDS.iter().any(|k| name.contains(k)) {
        return Some(Category::Flower);
    }
    if name.contains("green") || FRUIT_KEYWORDS.iter().any(|k| name.contains(k)) {
        return Some(Category::Fruit);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flower_keywords_categorise_as_flower() {
        for name in ["flower", "Yellow_Flower", "bloom", "apple_blossom", "b_green"] {
            assert_eq!(categorize_class(name), Some(Category::Flower), "{name}");
        }
    }

    #[test]
    fn fruit_keywords_categorise_as_fruit() {
        for name in [
            "fruit",
            "strawberry",
            "pea_pod",
            "apple",
            "tomato",
            "fully_ripened",
            "half_ripened",
            "l_green",
        ] {
            assert_eq!(categorize_class(name), Some(Category::Fruit), "{name}");
        }
    }

    #[test]
    fn unrelated_classes_have_no_category() {
        assert_eq!(categorize_class("leaf"), None);
        assert_eq!(categorize_class("stem"), None);
        assert_eq!(categorize_class(""), None);
    }

    #[test]
    fn flower_wins_when_both_keyword_sets_match() {
        // "apple_blossom" contains both "apple" and "blossom"
        assert_eq!(categorize_class("apple_blossom"), Some(Category::Flower));
    }

    #[test]
    fn classified_lowercases_name() {
        let d = Detection::classified("Tomato", 0.8, None);
        assert_eq!(d.class_name, "tomato");
        assert_eq!(d.category, Some(Category::Fruit));
    }

    #[test]
    fn mixed_case_names_categorise_like_lower_case() {
        for name in ["FLOWER", "Fully_Ripened", "B_Green", "L_GREEN", "Leaf"] {
            let lower = name.to_lowercase();
            assert_eq!(categorize_class(name), categorize_lowercase(&lower), "{name}");
            assert_eq!(
                Detection::classified(name, 0.5, None).category,
                categorize_class(name),
                "{name}"
            );
        }
        assert_eq!(categorize_class("B_Green"), Some(Category::Flower));
        assert_eq!(categorize_class("Fully_Ripened"), Some(Category::Fruit));
    }

    #[test]
    fn center_box_converts_to_corners() {
        let b = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(b.x1, 40.0);
        assert_eq!(b.y1, 35.0);
        assert_eq!(b.x2, 60.0);
        assert_eq!(b.y2, 45.0);
        assert_eq!(b.area(), 200.0);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = BoundingBox { x1: 20.0, y1: 20.0, x2: 30.0, y2: 30.0 };
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = BoundingBox { x1: 5.0, y1: 0.0, x2: 15.0, y2: 10.0 };
        // intersection 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn serializes_class_field_name() {
        let d = Detection::with_category("flower", 0.9, None, Category::Flower);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["class"], "flower");
        assert_eq!(json["category"], "flower");
        assert!(json.get("bbox").is_none());
    }
}
