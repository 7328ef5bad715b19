use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alternatives::scoring::NutritionProfile;

pub const DOMESTIC_COUNTRY: &str = "India";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a product record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSource {
    OpenFoodFacts,
    Llm,
    Import,
}

impl ProductSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenFoodFacts => "off",
            Self::Llm => "llm",
            Self::Import => "import",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "off" | "open_food_facts" | "openfoodfacts" => Some(Self::OpenFoodFacts),
            "llm" | "ai" => Some(Self::Llm),
            "import" | "csv" => Some(Self::Import),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    #[default]
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub country_of_origin: String,
    pub is_indian: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub availability: String,
    pub where_to_buy: Vec<String>,
    pub rating: Option<f64>,
    pub source: Option<ProductSource>,
    pub confidence: Option<ConfidenceTier>,
    pub verified: bool,
    pub off_raw: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First comma segment of the free-text category.
    pub fn canonical_category(&self) -> &str {
        canonical_category(&self.category)
    }

    pub fn nutrition(&self) -> NutritionProfile {
        NutritionProfile::from_raw_payload(self.off_raw.as_ref())
    }
}

/// Insert shape for the products table; the store assigns id and timestamps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub country_of_origin: String,
    pub is_indian: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub availability: String,
    pub where_to_buy: Vec<String>,
    pub rating: Option<f64>,
    pub source: Option<ProductSource>,
    pub confidence: Option<ConfidenceTier>,
    pub verified: bool,
    pub off_raw: Option<Value>,
}

impl NewProduct {
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            barcode: self.barcode,
            name: self.name,
            brand: self.brand,
            category: self.category,
            country_of_origin: self.country_of_origin,
            is_indian: self.is_indian,
            description: self.description,
            image_url: self.image_url,
            price: self.price,
            availability: self.availability,
            where_to_buy: self.where_to_buy,
            rating: self.rating,
            source: self.source,
            confidence: self.confidence,
            verified: self.verified,
            off_raw: self.off_raw,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns the first comma-separated segment, trimmed. Falls back to the whole
/// trimmed string when the first segment is blank.
pub fn canonical_category(category: &str) -> &str {
    let first = category.split(',').next().map(str::trim).unwrap_or_default();
    if first.is_empty() {
        category.trim()
    } else {
        first
    }
}

/// Synthesizes a barcode for records that have no physical one, e.g. `ALT_1718000000000_k3j9x0a2b`.
pub fn synthetic_barcode(prefix: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String =
        (0..9).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("{prefix}_{}_{suffix}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::{canonical_category, synthetic_barcode, ConfidenceTier, ProductSource};

    #[test]
    fn canonical_category_takes_first_segment() {
        assert_eq!(canonical_category("Beverages, Carbonated drinks, Sodas"), "Beverages");
        assert_eq!(canonical_category("  Snacks  "), "Snacks");
        assert_eq!(canonical_category(", Sodas"), ", Sodas");
        assert_eq!(canonical_category(""), "");
    }

    #[test]
    fn synthetic_barcodes_are_prefixed_and_unique() {
        let first = synthetic_barcode("ALT");
        let second = synthetic_barcode("ALT");

        assert!(first.starts_with("ALT_"));
        let suffix = first.rsplit('_').next().unwrap_or_default();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(first, second);
    }

    #[test]
    fn confidence_and_source_parse_case_insensitively() {
        assert_eq!(ConfidenceTier::parse(" HIGH "), Some(ConfidenceTier::High));
        assert_eq!(ConfidenceTier::parse("certain"), None);
        assert_eq!(ProductSource::parse("OFF"), Some(ProductSource::OpenFoodFacts));
        assert_eq!(ProductSource::parse("LLM"), Some(ProductSource::Llm));
        assert_eq!(ConfidenceTier::default(), ConfidenceTier::Medium);
    }
}
