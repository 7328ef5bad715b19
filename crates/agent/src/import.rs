use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use vocalkart_core::alternatives::response::number_field;
use vocalkart_core::alternatives::{normalize_price, normalize_quality, DEFAULT_MATCH_SCORE};
use vocalkart_core::domain::alternative::{clamp_match_score, NewAlternativeLink};
use vocalkart_core::domain::product::{ConfidenceTier, NewProduct, ProductId, ProductSource};
use vocalkart_core::errors::ApplicationError;
use vocalkart_db::repositories::{AlternativeRepository, ProductRepository, RepositoryError};

use crate::persistence_error;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    pub products: Option<Vec<ImportProduct>>,
    pub alternatives: Option<Vec<ImportAlternative>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ImportProduct {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub country_of_origin: String,
    #[serde(default)]
    pub is_indian: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub where_to_buy: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub verified: bool,
}

impl From<ImportProduct> for NewProduct {
    fn from(row: ImportProduct) -> Self {
        NewProduct {
            barcode: row.barcode,
            name: row.name,
            brand: row.brand,
            category: row.category,
            country_of_origin: row.country_of_origin,
            is_indian: row.is_indian,
            description: row.description,
            image_url: row.image_url,
            price: row.price,
            availability: row.availability.unwrap_or_else(|| "unknown".to_string()),
            where_to_buy: row.where_to_buy,
            rating: row.rating,
            source: Some(ProductSource::Import),
            confidence: None,
            verified: row.verified,
            off_raw: None,
        }
    }
}

/// Alternative row as supplied by an importer. Labels and scores are free-form
/// and get normalized before they reach the store.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ImportAlternative {
    pub original_product_id: String,
    pub indian_product_id: String,
    #[serde(default)]
    pub match_score: Option<Value>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub quality_comparison: Option<String>,
    #[serde(default)]
    pub price_comparison: Option<String>,
    #[serde(default)]
    pub reason_tags: Vec<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

impl From<ImportAlternative> for NewAlternativeLink {
    fn from(row: ImportAlternative) -> Self {
        let match_score = number_field(row.match_score.as_ref())
            .filter(|score| score.is_finite())
            .map(|score| clamp_match_score(score.round() as i64))
            .unwrap_or(DEFAULT_MATCH_SCORE);

        NewAlternativeLink {
            original_product_id: ProductId(row.original_product_id),
            indian_product_id: ProductId(row.indian_product_id),
            match_score,
            reason: row.reason.unwrap_or_default(),
            quality_comparison: normalize_quality(row.quality_comparison.as_deref()),
            price_comparison: normalize_price(row.price_comparison.as_deref()),
            reason_tags: row.reason_tags,
            confidence: row.confidence.as_deref().and_then(ConfidenceTier::parse),
            source_urls: row.source_urls,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub products: usize,
    pub alternatives: usize,
}

impl ImportSummary {
    pub fn message(&self) -> String {
        format!("Imported {} products and {} alternatives", self.products, self.alternatives)
    }
}

/// Bulk import. Products are upserted by barcode before alternatives are
/// inserted; the first store failure aborts the rest of the import.
pub struct CatalogImporter {
    products: Arc<dyn ProductRepository>,
    alternatives: Arc<dyn AlternativeRepository>,
}

impl CatalogImporter {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        alternatives: Arc<dyn AlternativeRepository>,
    ) -> Self {
        Self { products, alternatives }
    }

    pub async fn import(&self, request: ImportRequest) -> Result<ImportSummary, ApplicationError> {
        if request.products.is_none() && request.alternatives.is_none() {
            return Err(ApplicationError::invalid_input("No data provided"));
        }
        let products = request.products.unwrap_or_default();
        let alternatives = request.alternatives.unwrap_or_default();

        self.store(products, alternatives).await.map_err(|failure| {
            error!(event_name = "pipeline.import.failed", error = %failure, "import aborted");
            persistence_error(failure)
        })
    }

    async fn store(
        &self,
        products: Vec<ImportProduct>,
        alternatives: Vec<ImportAlternative>,
    ) -> Result<ImportSummary, RepositoryError> {
        let summary = ImportSummary { products: products.len(), alternatives: alternatives.len() };

        for product in products {
            self.products.upsert_by_barcode(product.into()).await?;
        }
        for alternative in alternatives {
            self.alternatives.insert(alternative.into()).await?;
        }

        info!(
            event_name = "pipeline.import.completed",
            products = summary.products,
            alternatives = summary.alternatives,
            "import finished"
        );
        Ok(summary)
    }
}
