//! External product database client (OpenFoodFacts).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use vocalkart_core::alternatives::response::non_empty_string;
use vocalkart_core::catalog::{country_from_tags, is_domestic_by_tags};
use vocalkart_core::config::LookupConfig;
use vocalkart_core::domain::product::canonical_category;
use vocalkart_core::NutritionProfile;

pub const SEARCH_PAGE_SIZE: u32 = 10;

/// A product record as returned by the lookup service, with the fields the
/// pipeline reads pulled out and the raw payload kept alongside.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupProduct {
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub brands: Option<String>,
    pub categories: Option<String>,
    pub countries_tags: Vec<String>,
    pub countries: Option<String>,
    pub ingredients_text: Option<String>,
    pub generic_name: Option<String>,
    pub image_url: Option<String>,
    pub quantity: Option<String>,
    pub raw: Value,
}

impl LookupProduct {
    pub fn from_value(raw: Value) -> Self {
        let text = |key: &str| non_empty_string(raw.get(key));
        let countries_tags = raw
            .get("countries_tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            barcode: text("code"),
            name: text("product_name"),
            brands: text("brands"),
            categories: text("categories"),
            countries_tags,
            countries: text("countries"),
            ingredients_text: text("ingredients_text"),
            generic_name: text("generic_name"),
            image_url: text("image_url").or_else(|| text("image_front_url")),
            quantity: text("quantity"),
            raw,
        }
    }

    /// First category segment, or `Food`.
    pub fn category(&self) -> String {
        self.categories
            .as_deref()
            .map(canonical_category)
            .filter(|category| !category.is_empty())
            .unwrap_or("Food")
            .to_string()
    }

    pub fn country(&self) -> String {
        country_from_tags(&self.countries_tags).unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn is_domestic(&self) -> bool {
        is_domestic_by_tags(&self.countries_tags, self.countries.as_deref())
    }

    /// Ingredients or generic name, plus an energy sentence when the payload
    /// reports one.
    pub fn description(&self) -> String {
        let mut description = self
            .ingredients_text
            .clone()
            .or_else(|| self.generic_name.clone())
            .unwrap_or_else(|| "No description available".to_string());

        let energy = NutritionProfile::from_raw_payload(Some(&self.raw)).energy_kcal;
        if energy > 0.0 {
            description.push_str(&format!(" Energy: {energy} kcal per 100g."));
        }
        description
    }
}

#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// `Ok(None)` when the service does not know the barcode.
    async fn by_barcode(&self, barcode: &str) -> Result<Option<LookupProduct>>;

    async fn search(&self, query: &str) -> Result<Vec<LookupProduct>>;
}

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build lookup HTTP client")?;

        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl ProductLookup for OpenFoodFactsClient {
    async fn by_barcode(&self, barcode: &str) -> Result<Option<LookupProduct>> {
        let url = format!("{}/api/v0/product/{barcode}.json", self.base_url);
        let payload: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("lookup request failed")?
            .error_for_status()
            .context("lookup service returned an error status")?
            .json()
            .await
            .context("failed to decode lookup response")?;

        let status = payload.get("status").and_then(Value::as_i64).unwrap_or_default();
        debug!(barcode, status, "lookup response received");

        if status != 1 {
            return Ok(None);
        }
        let Some(mut product) = payload.get("product").cloned().filter(Value::is_object) else {
            return Ok(None);
        };
        if product.get("code").is_none() {
            if let (Some(object), Some(code)) = (product.as_object_mut(), payload.get("code")) {
                object.insert("code".to_string(), code.clone());
            }
        }
        Ok(Some(LookupProduct::from_value(product)))
    }

    async fn search(&self, query: &str) -> Result<Vec<LookupProduct>> {
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let payload: Value = self
            .client
            .get(format!("{}/cgi/search.pl", self.base_url))
            .query(&[
                ("search_terms", query),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
            ])
            .send()
            .await
            .context("lookup search request failed")?
            .error_for_status()
            .context("lookup search returned an error status")?
            .json()
            .await
            .context("failed to decode lookup search response")?;

        Ok(payload
            .get("products")
            .and_then(Value::as_array)
            .map(|products| products.iter().cloned().map(LookupProduct::from_value).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vocalkart_core::config::LookupConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{LookupProduct, OpenFoodFactsClient, ProductLookup};

    fn client(server: &MockServer) -> OpenFoodFactsClient {
        OpenFoodFactsClient::from_config(&LookupConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            user_agent: "vocalkart-test".to_string(),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn by_barcode_maps_found_products() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/product/8901063010017.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 1,
                "code": "8901063010017",
                "product": {
                    "product_name": "Parle-G",
                    "brands": "Parle",
                    "categories": "Snacks, Biscuits",
                    "countries_tags": ["en:india"],
                    "nutriments": { "energy-kcal_100g": 450 }
                }
            })))
            .mount(&server)
            .await;

        let product = client(&server)
            .by_barcode("8901063010017")
            .await
            .expect("lookup")
            .expect("found");

        assert_eq!(product.barcode.as_deref(), Some("8901063010017"));
        assert_eq!(product.name.as_deref(), Some("Parle-G"));
        assert_eq!(product.category(), "Snacks");
        assert_eq!(product.country(), "india");
        assert!(product.is_domestic());
        assert_eq!(product.description(), "No description available Energy: 450 kcal per 100g.");
    }

    #[tokio::test]
    async fn by_barcode_reports_unknown_products_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/product/000.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": 0, "status_verbose": "product not found" })),
            )
            .mount(&server)
            .await;

        assert!(client(&server).by_barcode("000").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn search_sends_simple_search_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi/search.pl"))
            .and(query_param("search_terms", "mango drink"))
            .and(query_param("search_simple", "1"))
            .and(query_param("action", "process"))
            .and(query_param("json", "1"))
            .and(query_param("page_size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "products": [
                    { "code": "1", "product_name": "Maaza", "countries_tags": ["en:india"] },
                    { "code": "2", "product_name": "Tropicana" }
                ]
            })))
            .mount(&server)
            .await;

        let products = client(&server).search("mango drink").await.expect("search");
        assert_eq!(products.len(), 2);
        assert!(products[0].is_domestic());
        assert!(!products[1].is_domestic());
    }

    #[tokio::test]
    async fn server_errors_surface_as_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(502)).mount(&server).await;

        assert!(client(&server).by_barcode("1").await.is_err());
        assert!(client(&server).search("x").await.is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let product = LookupProduct::from_value(json!({ "generic_name": "Soft drink" }));

        assert_eq!(product.category(), "Food");
        assert_eq!(product.country(), "Unknown");
        assert_eq!(product.description(), "Soft drink");
    }
}
