//! Nutrition-distance scoring for candidate alternatives.
//!
//! The distance is a weighted sum of absolute per-100g differences in energy,
//! sugar and fat. Values are compared as reported; products whose payloads use
//! differing serving bases are not normalized against each other.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::product::Product;

/// Weights for the nutrition distance components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionWeights {
    /// Weight for energy difference (default: 0.60)
    pub energy: f64,
    /// Weight for sugar difference (default: 0.30)
    pub sugar: f64,
    /// Weight for fat difference (default: 0.10)
    pub fat: f64,
}

impl Default for NutritionWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

impl NutritionWeights {
    pub fn sum(&self) -> f64 {
        self.energy + self.sugar + self.fat
    }
}

/// The three nutrient values the distance looks at. Absent values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionProfile {
    pub energy_kcal: f64,
    pub sugars: f64,
    pub fat: f64,
}

impl NutritionProfile {
    /// Reads the `nutriments` object of an external product payload.
    pub fn from_raw_payload(raw: Option<&Value>) -> Self {
        match raw.and_then(|payload| payload.get("nutriments")) {
            Some(nutriments) => Self::from_nutriments(nutriments),
            None => Self::default(),
        }
    }

    pub fn from_nutriments(nutriments: &Value) -> Self {
        let energy = nutrient(nutriments, "energy-kcal_100g");
        let energy = if energy == 0.0 { nutrient(nutriments, "energy_100g") } else { energy };

        Self {
            energy_kcal: energy,
            sugars: nutrient(nutriments, "sugars_100g"),
            fat: nutrient(nutriments, "fat_100g"),
        }
    }
}

fn nutrient(nutriments: &Value, key: &str) -> f64 {
    let value = match nutriments.get(key) {
        Some(value) if !value.is_null() => Some(value),
        _ => nutriments.get(key.replace('-', "_")),
    };

    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    }
}

/// Weighted absolute difference between two profiles.
pub fn nutrition_distance(
    a: &NutritionProfile,
    b: &NutritionProfile,
    weights: &NutritionWeights,
) -> f64 {
    weights.energy * (a.energy_kcal - b.energy_kcal).abs()
        + weights.sugar * (a.sugars - b.sugars).abs()
        + weights.fat * (a.fat - b.fat).abs()
}

/// A candidate paired with its distance from the source product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub product: Product,
    pub nutrition_distance: f64,
}

/// Candidate ranker over nutrition distance.
#[derive(Debug, Clone, Default)]
pub struct CandidateRanker {
    weights: NutritionWeights,
}

impl CandidateRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: NutritionWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &NutritionWeights {
        &self.weights
    }

    /// Orders candidates by ascending distance. The sort is stable, so equal
    /// distances keep their input order. Returns an empty list when there is
    /// nothing to rank.
    pub fn rank(
        &self,
        source: &NutritionProfile,
        candidates: Vec<Product>,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|product| {
                let distance = nutrition_distance(source, &product.nutrition(), &self.weights);
                ScoredCandidate { product, nutrition_distance: distance }
            })
            .collect();

        scored.sort_by(|a, b| a.nutrition_distance.total_cmp(&b.nutrition_distance));
        scored
    }
}
