use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vocalkart_core::alternatives::extract_json_array;
use vocalkart_core::alternatives::response::{
    decimal_field, non_empty_string, number_field, string_list,
};
use vocalkart_core::catalog::is_domestic_country;
use vocalkart_core::domain::product::{synthetic_barcode, NewProduct, Product, ProductSource};
use vocalkart_core::errors::ApplicationError;
use vocalkart_core::prompts::PromptLibrary;
use vocalkart_db::repositories::{ProductRepository, ProductSearch};

use crate::llm::LlmClient;
use crate::lookup::{LookupProduct, ProductLookup};
use crate::pricing::PriceBackfill;

pub const MAX_QUERY_LEN: usize = 200;
pub const STORE_RESULT_LIMIT: u32 = 10;
pub const LOOKUP_RESULT_LIMIT: usize = 5;
pub const GENERATED_RESULT_LIMIT: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub search_query: String,
    pub category: Option<String>,
    pub indian_only: bool,
}

impl SearchRequest {
    /// Category filter, with blank and `all` meaning no filter.
    fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty() && !category.eq_ignore_ascii_case("all"))
    }
}

/// Searches the catalog, then the lookup service, then the generator. Results
/// from the later sources are stored before being returned. Every returned
/// product carries a price.
pub struct ProductSearcher {
    products: Arc<dyn ProductRepository>,
    lookup: Arc<dyn ProductLookup>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    prices: PriceBackfill,
}

impl ProductSearcher {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        lookup: Arc<dyn ProductLookup>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        let prices = PriceBackfill::new(products.clone(), llm.clone(), prompts.clone());
        Self { products, lookup, llm, prompts, prices }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Product>, ApplicationError> {
        let query = request.search_query.trim();
        if query.is_empty() || request.search_query.len() > MAX_QUERY_LEN {
            return Err(ApplicationError::invalid_input("Invalid search query"));
        }
        let category = request.category_filter();

        let stored = self
            .products
            .search(&ProductSearch {
                query: query.to_string(),
                category: category.map(str::to_string),
                domestic_only: request.indian_only,
                limit: STORE_RESULT_LIMIT,
            })
            .await
            .unwrap_or_else(|error| {
                warn!(
                    event_name = "pipeline.search.store_failed",
                    error = %error,
                    "catalog search failed"
                );
                Vec::new()
            });
        if !stored.is_empty() {
            info!(
                event_name = "pipeline.search.store_hit",
                query,
                hits = stored.len(),
                "catalog search hit"
            );
            return Ok(self.prices.backfill(stored).await);
        }

        let looked_up = self.from_lookup(query, request.indian_only).await;
        if !looked_up.is_empty() {
            info!(
                event_name = "pipeline.search.lookup_hit",
                query,
                hits = looked_up.len(),
                "lookup search hit"
            );
            return Ok(self.prices.backfill(looked_up).await);
        }

        let generated = self.from_generator(query, category, request.indian_only).await;
        info!(
            event_name = "pipeline.search.generated",
            query,
            hits = generated.len(),
            "generator search finished"
        );
        Ok(self.prices.backfill(generated).await)
    }

    async fn from_lookup(&self, query: &str, indian_only: bool) -> Vec<Product> {
        let records = match self.lookup.search(query).await {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    event_name = "pipeline.lookup.failed",
                    query,
                    error = %error,
                    "lookup search failed"
                );
                return Vec::new();
            }
        };

        let mut saved = Vec::new();
        for record in records.into_iter().take(LOOKUP_RESULT_LIMIT) {
            let is_indian = record.is_domestic();
            if indian_only && !is_indian {
                continue;
            }
            match self.products.upsert_by_barcode(lookup_to_product(record, is_indian)).await {
                Ok(product) => saved.push(product),
                Err(error) => warn!(error = %error, "failed to store lookup search result"),
            }
        }
        saved
    }

    /// Generator fallback. Any failure here yields an empty list.
    async fn from_generator(
        &self,
        query: &str,
        category: Option<&str>,
        indian_only: bool,
    ) -> Vec<Product> {
        let Ok(prompt) = self.prompts.search_products(query, category, indian_only) else {
            return Vec::new();
        };
        let reply = self.llm.complete(&prompt).await;
        let entries = match reply.map(|reply| extract_json_array(&reply)) {
            Ok(Ok(entries)) => entries,
            Ok(Err(error)) => {
                warn!(
                    event_name = "pipeline.search.malformed",
                    error = %error,
                    "generator search reply unusable"
                );
                return Vec::new();
            }
            Err(error) => {
                warn!(
                    event_name = "pipeline.search.generate_failed",
                    error = %error,
                    "generator search failed"
                );
                return Vec::new();
            }
        };

        let mut saved = Vec::new();
        for entry in entries.iter().filter_map(generated_to_product).take(GENERATED_RESULT_LIMIT) {
            match self.products.insert(entry).await {
                Ok(product) => saved.push(product),
                Err(error) => warn!(error = %error, "failed to store generated search result"),
            }
        }
        debug!(saved = saved.len(), "generated search results stored");
        saved
    }
}

fn lookup_to_product(record: LookupProduct, is_indian: bool) -> NewProduct {
    NewProduct {
        barcode: record.barcode.clone().unwrap_or_else(|| synthetic_barcode("OFF")),
        name: record.name.clone().unwrap_or_else(|| "Unknown Product".to_string()),
        brand: record.brands.clone().unwrap_or_else(|| "Unknown Brand".to_string()),
        category: record.category(),
        country_of_origin: record.country(),
        is_indian,
        description: Some(
            record
                .ingredients_text
                .clone()
                .or_else(|| record.generic_name.clone())
                .unwrap_or_else(|| "No description available".to_string()),
        ),
        image_url: record.image_url.clone(),
        price: Decimal::ZERO,
        availability: "unknown".to_string(),
        where_to_buy: vec!["Local Stores".to_string(), "Online Retailers".to_string()],
        rating: None,
        source: Some(ProductSource::OpenFoodFacts),
        confidence: None,
        verified: false,
        off_raw: Some(record.raw),
    }
}

fn generated_to_product(entry: &Value) -> Option<NewProduct> {
    let name = non_empty_string(entry.get("name"))?;
    let country_of_origin =
        non_empty_string(entry.get("country_of_origin")).unwrap_or_else(|| "Unknown".to_string());

    Some(NewProduct {
        barcode: synthetic_barcode("AI"),
        brand: non_empty_string(entry.get("brand")).unwrap_or_else(|| "Unknown Brand".to_string()),
        category: non_empty_string(entry.get("category")).unwrap_or_else(|| "Food".to_string()),
        is_indian: is_domestic_country(&country_of_origin),
        country_of_origin,
        description: non_empty_string(entry.get("description")),
        image_url: None,
        price: decimal_field(entry.get("price")).unwrap_or(Decimal::ZERO),
        availability: non_empty_string(entry.get("availability"))
            .unwrap_or_else(|| "unknown".to_string()),
        where_to_buy: string_list(entry.get("where_to_buy")),
        rating: number_field(entry.get("rating")).filter(|rating| rating.is_finite()),
        source: Some(ProductSource::Llm),
        confidence: None,
        verified: false,
        off_raw: None,
        name,
    })
}
