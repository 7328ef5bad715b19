use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use vocalkart_core::alternatives::response::{non_empty_string, string_list};
use vocalkart_core::alternatives::extract_json_object;
use vocalkart_core::catalog::pricing::GENERATOR_ESTIMATE_THRESHOLD;
use vocalkart_core::catalog::{truthy_flag, PriceHeuristics};
use vocalkart_core::domain::product::{ConfidenceTier, NewProduct, Product, ProductSource};
use vocalkart_core::errors::ApplicationError;
use vocalkart_core::prompts::{PriceEstimateDetails, PromptLibrary};
use vocalkart_db::repositories::ProductRepository;

use crate::llm::LlmClient;
use crate::lookup::{LookupProduct, ProductLookup};
use crate::persistence_error;
use crate::pricing::PriceBackfill;

pub const MAX_BARCODE_LEN: usize = 50;

const UNKNOWN_NAME: &str = "Unknown Product";
const UNKNOWN_BRAND: &str = "Unknown Brand";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentifyRequest {
    pub barcode: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdentifyOutcome {
    pub product: Product,
    /// Generator verdict on the lookup record, when one was obtained.
    pub validation: Option<Value>,
}

/// Identifies a barcode: stored product, lookup service record (checked by the
/// generator), or a generator retrieval backed by source URLs.
pub struct ProductIdentifier {
    products: Arc<dyn ProductRepository>,
    lookup: Arc<dyn ProductLookup>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    prices: PriceBackfill,
    heuristics: PriceHeuristics,
}

impl ProductIdentifier {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        lookup: Arc<dyn ProductLookup>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        let prices = PriceBackfill::new(products.clone(), llm.clone(), prompts.clone());
        Self { products, lookup, llm, prompts, prices, heuristics: PriceHeuristics::default() }
    }

    pub async fn identify(
        &self,
        request: &IdentifyRequest,
    ) -> Result<IdentifyOutcome, ApplicationError> {
        let barcode = request.barcode.trim();
        if barcode.is_empty() || barcode.len() > MAX_BARCODE_LEN {
            return Err(ApplicationError::invalid_input("Invalid barcode format"));
        }

        if let Some(product) =
            self.products.find_by_barcode(barcode).await.map_err(persistence_error)?
        {
            info!(event_name = "pipeline.identify.cached", barcode, "barcode already catalogued");
            return Ok(IdentifyOutcome { product, validation: None });
        }

        let (product, validation) = match self.lookup_record(barcode).await {
            Some(record) => {
                let validation = self.validate(&record).await;
                let product = self.from_lookup(barcode, record, validation.as_ref()).await;
                (product, validation)
            }
            None => match self.retrieve(barcode).await {
                Some(product) => (product, None),
                None => {
                    info!(
                        event_name = "pipeline.identify.not_found",
                        barcode,
                        "no source knows this barcode"
                    );
                    return Err(ApplicationError::product_not_found(barcode));
                }
            },
        };

        let saved = self.products.upsert_by_barcode(product).await.map_err(persistence_error)?;
        info!(
            event_name = "pipeline.identify.completed",
            barcode,
            product_id = %saved.id,
            source = saved.source.map(|source| source.as_str()).unwrap_or("unknown"),
            "product identified"
        );
        Ok(IdentifyOutcome { product: saved, validation })
    }

    async fn lookup_record(&self, barcode: &str) -> Option<LookupProduct> {
        match self.lookup.by_barcode(barcode).await {
            Ok(record) => record,
            Err(error) => {
                warn!(
                    event_name = "pipeline.lookup.failed",
                    barcode,
                    error = %error,
                    "lookup service unavailable, treating as not found"
                );
                None
            }
        }
    }

    async fn validate(&self, record: &LookupProduct) -> Option<Value> {
        let prompt = self.prompts.validate_product(&record.raw).ok()?;
        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "pipeline.identify.validation_failed",
                    error = %error,
                    "validation skipped"
                );
                return None;
            }
        };
        extract_json_object(&reply)
            .map_err(|error| warn!(error = %error, "validation reply was not a JSON object"))
            .ok()
    }

    async fn from_lookup(
        &self,
        barcode: &str,
        record: LookupProduct,
        validation: Option<&Value>,
    ) -> NewProduct {
        let confidence = validation
            .and_then(|verdict| verdict.get("confidence"))
            .and_then(Value::as_str)
            .and_then(ConfidenceTier::parse)
            .unwrap_or_default();
        let is_indian = truthy_flag(validation.and_then(|verdict| verdict.get("is_indian")))
            || record.is_domestic();

        let name = record.name.clone().unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let brand = record.brands.clone().unwrap_or_else(|| UNKNOWN_BRAND.to_string());
        let category = record.category();
        let country_of_origin = record.country();

        let price = self
            .price(PriceEstimateDetails {
                name: name.clone(),
                brand: brand.clone(),
                category: category.clone(),
                country_of_origin: country_of_origin.clone(),
                is_indian,
                quantity: record.quantity.clone(),
            })
            .await;

        NewProduct {
            barcode: record.barcode.clone().unwrap_or_else(|| barcode.to_string()),
            name,
            brand,
            category,
            country_of_origin,
            is_indian,
            description: Some(record.description()),
            image_url: record.image_url.clone(),
            price,
            availability: "unknown".to_string(),
            where_to_buy: vec!["Local Stores".to_string(), "Online Retailers".to_string()],
            rating: None,
            source: Some(ProductSource::OpenFoodFacts),
            confidence: Some(confidence),
            verified: confidence == ConfidenceTier::High,
            off_raw: Some(record.raw),
        }
    }

    /// Asks the generator for the barcode. Only answers that are not low
    /// confidence and cite at least one source are accepted.
    async fn retrieve(&self, barcode: &str) -> Option<NewProduct> {
        let prompt = self.prompts.retrieve_product(barcode).ok()?;
        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "pipeline.identify.retrieval_failed",
                    barcode,
                    error = %error,
                    "generator retrieval failed"
                );
                return None;
            }
        };
        let found = extract_json_object(&reply).ok()?;

        let confidence =
            found.get("confidence").and_then(Value::as_str).and_then(ConfidenceTier::parse);
        let source_urls = string_list(found.get("source_urls"));
        if confidence == Some(ConfidenceTier::Low) || source_urls.is_empty() {
            info!(barcode, "generator retrieval lacked confidence or sources");
            return None;
        }
        let confidence = confidence.unwrap_or(ConfidenceTier::Low);

        let text = |key: &str| non_empty_string(found.get(key));
        let is_indian = truthy_flag(found.get("is_indian"));
        let name = text("name").unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let brand = text("brand").unwrap_or_else(|| UNKNOWN_BRAND.to_string());
        let category = text("categories").unwrap_or_else(|| "Unknown".to_string());
        let country_of_origin = text("countries").unwrap_or_else(|| "Unknown".to_string());

        let price = self
            .price(PriceEstimateDetails {
                name: name.clone(),
                brand: brand.clone(),
                category: category.clone(),
                country_of_origin: country_of_origin.clone(),
                is_indian,
                quantity: None,
            })
            .await;

        Some(NewProduct {
            barcode: barcode.to_string(),
            description: Some(
                text("description").unwrap_or_else(|| "No description available".to_string()),
            ),
            image_url: text("image_url"),
            name,
            brand,
            category,
            country_of_origin,
            is_indian,
            price,
            availability: "unknown".to_string(),
            where_to_buy: vec!["Online Stores".to_string()],
            rating: None,
            source: Some(ProductSource::Llm),
            confidence: Some(confidence),
            verified: confidence == ConfidenceTier::High,
            off_raw: Some(json!({})),
        })
    }

    async fn price(&self, details: PriceEstimateDetails) -> Decimal {
        let estimate = self.heuristics.estimate(
            &details.name,
            &details.brand,
            &details.category,
            details.is_indian,
        );
        if estimate <= Decimal::from(GENERATOR_ESTIMATE_THRESHOLD) {
            return self.prices.estimate(&details).await;
        }
        estimate
    }
}
