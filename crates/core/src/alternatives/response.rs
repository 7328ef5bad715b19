//! Boundary types for generated text.
//!
//! The generator returns prose that is expected to contain one JSON array (or
//! object). Extraction takes the outermost bracketed span; each array element is
//! then validated into a [`RawAlternative`] before it enters the domain.

use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use super::normalize::{normalize_price, normalize_quality};
use super::DEFAULT_MATCH_SCORE;
use crate::domain::alternative::{clamp_match_score, PriceComparison, QualityComparison};
use crate::domain::product::ConfidenceTier;

pub const DEFAULT_REASON: &str = "Similar product category and quality";
pub const DEFAULT_REASON_TAG: &str = "same_category";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no JSON array found in generated text")]
    NoArray,
    #[error("no JSON object found in generated text")]
    NoObject,
    #[error("generated JSON could not be parsed: {0}")]
    InvalidJson(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RejectedAlternative {
    #[error("alternative entry is not a JSON object")]
    NotAnObject,
    #[error("alternative entry is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Extracts the span from the first `[` to the last `]` and parses it.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>, ExtractionError> {
    let span = outer_span(text, '[', ']').ok_or(ExtractionError::NoArray)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(ExtractionError::NoArray),
        Err(error) => Err(ExtractionError::InvalidJson(error.to_string())),
    }
}

/// Extracts the span from the first `{` to the last `}` and parses it.
pub fn extract_json_object(text: &str) -> Result<Value, ExtractionError> {
    let span = outer_span(text, '{', '}').ok_or(ExtractionError::NoObject)?;
    match serde_json::from_str::<Value>(span) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ExtractionError::NoObject),
        Err(error) => Err(ExtractionError::InvalidJson(error.to_string())),
    }
}

fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// One alternative as proposed by the generator, validated and with defaults
/// applied. Comparison labels are already normalized.
#[derive(Clone, Debug, PartialEq)]
pub struct RawAlternative {
    pub name: String,
    pub brand: String,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub match_score: u8,
    pub reason: String,
    pub quality_comparison: QualityComparison,
    pub price_comparison: PriceComparison,
    pub reason_tags: Vec<String>,
    pub confidence: ConfidenceTier,
    pub source_urls: Vec<String>,
}

impl RawAlternative {
    pub fn from_value(value: &Value) -> Result<Self, RejectedAlternative> {
        let object = value.as_object().ok_or(RejectedAlternative::NotAnObject)?;

        let name = non_empty_string(object.get("name"))
            .ok_or(RejectedAlternative::MissingField("name"))?;
        let brand = non_empty_string(object.get("brand"))
            .ok_or(RejectedAlternative::MissingField("brand"))?;

        let match_score = number_field(object.get("match_score"))
            .filter(|score| score.is_finite() && *score != 0.0)
            .map(|score| clamp_match_score(score.round() as i64))
            .unwrap_or(DEFAULT_MATCH_SCORE);

        let reason_tags = string_list(object.get("reason_tags"));
        let reason_tags =
            if reason_tags.is_empty() { vec![DEFAULT_REASON_TAG.to_string()] } else { reason_tags };

        Ok(Self {
            name,
            brand,
            category: non_empty_string(object.get("category")),
            price: decimal_field(object.get("price")),
            match_score,
            reason: non_empty_string(object.get("reason"))
                .unwrap_or_else(|| DEFAULT_REASON.to_string()),
            quality_comparison: normalize_quality(
                object.get("quality_comparison").and_then(Value::as_str),
            ),
            price_comparison: normalize_price(
                object.get("price_comparison").and_then(Value::as_str),
            ),
            reason_tags,
            confidence: object
                .get("confidence")
                .and_then(Value::as_str)
                .and_then(ConfidenceTier::parse)
                .unwrap_or_default(),
            source_urls: string_list(object.get("source_urls")),
        })
    }
}

pub fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn number_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn decimal_field(value: Option<&Value>) -> Option<Decimal> {
    number_field(value)
        .filter(|number| number.is_finite())
        .and_then(Decimal::from_f64_retain)
        .map(|price| price.round_dp(2))
}

pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{
        extract_json_array, extract_json_object, ExtractionError, RawAlternative,
        RejectedAlternative, DEFAULT_REASON,
    };
    use crate::domain::alternative::{PriceComparison, QualityComparison};
    use crate::domain::product::ConfidenceTier;

    #[test]
    fn array_is_extracted_from_surrounding_prose() {
        let text = r#"Here are the results: [{"name": "Frooti", "brand": "Parle Agro"}] Hope this helps."#;
        let items = extract_json_array(text).expect("array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "Frooti");
    }

    #[test]
    fn array_is_extracted_from_code_fences() {
        let text = "```json\n[\n  {\"name\": \"Amul Kool\", \"brand\": \"Amul\"},\n  {\"name\": \"Paper Boat\", \"brand\": \"Hector\"}\n]\n```";
        assert_eq!(extract_json_array(text).expect("array").len(), 2);
    }

    #[test]
    fn missing_array_is_an_error() {
        assert_eq!(extract_json_array("I could not find anything."), Err(ExtractionError::NoArray));
        assert_eq!(extract_json_array("] backwards ["), Err(ExtractionError::NoArray));
    }

    #[test]
    fn unparseable_array_is_an_error() {
        assert!(matches!(
            extract_json_array("[not json]"),
            Err(ExtractionError::InvalidJson(_))
        ));
    }

    #[test]
    fn object_is_extracted() {
        let value = extract_json_object("```json\n{\"is_indian\": \"true\"}\n```").expect("object");
        assert_eq!(value["is_indian"], "true");
        assert_eq!(extract_json_object("none"), Err(ExtractionError::NoObject));
    }

    #[test]
    fn raw_alternative_applies_defaults() {
        let raw = RawAlternative::from_value(&json!({ "name": "Frooti", "brand": "Parle Agro" }))
            .expect("valid");

        assert_eq!(raw.match_score, 85);
        assert_eq!(raw.reason, DEFAULT_REASON);
        assert_eq!(raw.reason_tags, vec!["same_category".to_string()]);
        assert_eq!(raw.quality_comparison, QualityComparison::Similar);
        assert_eq!(raw.price_comparison, PriceComparison::Similar);
        assert_eq!(raw.confidence, ConfidenceTier::Medium);
        assert!(raw.source_urls.is_empty());
        assert_eq!(raw.price, None);
    }

    #[test]
    fn raw_alternative_normalizes_and_clamps() {
        let raw = RawAlternative::from_value(&json!({
            "name": " Bovonto ",
            "brand": "Kali Aerated Water Works",
            "price": "25",
            "match_score": 140,
            "quality_comparison": "Superior taste",
            "price_comparison": "Much more affordable",
            "reason_tags": ["same_category", "", 7],
            "confidence": "HIGH",
        }))
        .expect("valid");

        assert_eq!(raw.name, "Bovonto");
        assert_eq!(raw.match_score, 100);
        assert_eq!(raw.price, Some(Decimal::new(25, 0)));
        assert_eq!(raw.quality_comparison, QualityComparison::Better);
        assert_eq!(raw.price_comparison, PriceComparison::Cheaper);
        assert_eq!(raw.reason_tags, vec!["same_category".to_string()]);
        assert_eq!(raw.confidence, ConfidenceTier::High);
    }

    #[test]
    fn raw_alternative_rejects_missing_required_fields() {
        assert_eq!(
            RawAlternative::from_value(&json!({ "brand": "Amul" })),
            Err(RejectedAlternative::MissingField("name"))
        );
        assert_eq!(
            RawAlternative::from_value(&json!({ "name": "Kool", "brand": "  " })),
            Err(RejectedAlternative::MissingField("brand"))
        );
        assert_eq!(
            RawAlternative::from_value(&json!("Amul Kool")),
            Err(RejectedAlternative::NotAnObject)
        );
    }
}
