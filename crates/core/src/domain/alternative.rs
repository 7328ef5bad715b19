use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::{ConfidenceTier, Product, ProductId};

pub const MIN_MATCH_SCORE: i64 = 1;
pub const MAX_MATCH_SCORE: i64 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlternativeId(pub String);

impl AlternativeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityComparison {
    Better,
    Similar,
    Good,
}

impl QualityComparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Better => "better",
            Self::Similar => "similar",
            Self::Good => "good",
        }
    }

    /// Exact literal parse, used when reading rows back from the store.
    pub fn from_literal(raw: &str) -> Option<Self> {
        match raw {
            "better" => Some(Self::Better),
            "similar" => Some(Self::Similar),
            "good" => Some(Self::Good),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceComparison {
    Cheaper,
    Similar,
    MoreExpensive,
}

impl PriceComparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheaper => "cheaper",
            Self::Similar => "similar",
            Self::MoreExpensive => "more_expensive",
        }
    }

    pub fn from_literal(raw: &str) -> Option<Self> {
        match raw {
            "cheaper" => Some(Self::Cheaper),
            "similar" => Some(Self::Similar),
            "more_expensive" => Some(Self::MoreExpensive),
            _ => None,
        }
    }
}

/// Directed link: `indian_product_id` is a suggested substitute for `original_product_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlternativeLink {
    pub id: AlternativeId,
    pub original_product_id: ProductId,
    pub indian_product_id: ProductId,
    pub match_score: u8,
    pub reason: String,
    pub quality_comparison: QualityComparison,
    pub price_comparison: PriceComparison,
    pub reason_tags: Vec<String>,
    pub confidence: Option<ConfidenceTier>,
    pub source_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape. The comparison fields are typed, so an out-of-vocabulary
/// label cannot reach the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewAlternativeLink {
    pub original_product_id: ProductId,
    pub indian_product_id: ProductId,
    pub match_score: u8,
    pub reason: String,
    pub quality_comparison: QualityComparison,
    pub price_comparison: PriceComparison,
    pub reason_tags: Vec<String>,
    pub confidence: Option<ConfidenceTier>,
    pub source_urls: Vec<String>,
}

impl NewAlternativeLink {
    pub fn into_link(self, id: AlternativeId, now: DateTime<Utc>) -> AlternativeLink {
        AlternativeLink {
            id,
            original_product_id: self.original_product_id,
            indian_product_id: self.indian_product_id,
            match_score: self.match_score,
            reason: self.reason,
            quality_comparison: self.quality_comparison,
            price_comparison: self.price_comparison,
            reason_tags: self.reason_tags,
            confidence: self.confidence,
            source_urls: self.source_urls,
            created_at: now,
        }
    }
}

/// A persisted link together with the product it points at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlternativeDetail {
    #[serde(flatten)]
    pub link: AlternativeLink,
    pub indian_product: Product,
}

/// Clamps an untrusted score into 1..=100.
pub fn clamp_match_score(raw: i64) -> u8 {
    raw.clamp(MIN_MATCH_SCORE, MAX_MATCH_SCORE) as u8
}
