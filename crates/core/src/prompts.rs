//! Prompt templates sent to the text-generation gateway.
//!
//! Templates are embedded and rendered with Tera. Every template that expects
//! structured output spells out the exact keys and closed vocabularies.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};
use thiserror::Error;

use crate::alternatives::scoring::ScoredCandidate;
use crate::alternatives::PROMPT_CANDIDATE_LIMIT;

const RANK_ALTERNATIVES: &str = "rank_alternatives";
const GENERATE_ALTERNATIVES: &str = "generate_alternatives";
const VALIDATE_PRODUCT: &str = "validate_product";
const RETRIEVE_PRODUCT: &str = "retrieve_product";
const ESTIMATE_PRICE: &str = "estimate_price";
const SEARCH_PRODUCTS: &str = "search_products";

const COMPARISON_CONTRACT: &str = r#"  "quality_comparison": "better" | "similar" | "good",
  "price_comparison": "cheaper" | "similar" | "more_expensive","#;

const RANK_ALTERNATIVES_TEMPLATE: &str = r#"You are an Indian product alternatives expert. Rank and validate these Indian product alternatives for "{{ product_name }}" ({{ product_category }}).

Candidates:
{% for candidate in candidates %}{{ loop.index }}. {{ candidate.name }} by {{ candidate.brand }} - {{ candidate.category }} - Rs {{ candidate.price }}
{% endfor %}
Original product price: Rs {{ source_price }}

Return JSON array with top 3 alternatives. Each should have:
{
  "name": "<exact name from candidates>",
  "brand": "<exact brand from candidates>",
  "match_score": <1-100>,
  "reason": "<why it's a good alternative in 1-2 sentences>",
{{ comparison_contract }}
  "reason_tags": ["same_category", "nutrition_similar", "popular_brand"],
  "confidence": "low|medium|high"
}

CRITICAL: price_comparison must be EXACTLY one of: "cheaper", "similar", "more_expensive"
CRITICAL: quality_comparison must be EXACTLY one of: "better", "similar", "good""#;

const GENERATE_ALTERNATIVES_TEMPLATE: &str = r#"You are an Indian product alternatives expert. The foreign product "{{ product_name }}" by {{ product_brand }} in category {{ product_category }} (Rs {{ source_price }}) needs Indian alternatives.

Generate 3 authentic Indian alternatives. Return JSON array with each having:
{
  "name": "<product name>",
  "brand": "<Indian brand>",
  "category": "<category>",
  "price": <estimated INR as number>,
  "match_score": <1-100>,
  "reason": "<why it's a good alternative in 1-2 sentences>",
{{ comparison_contract }}
  "reason_tags": ["same_category", "similar_use"],
  "confidence": "medium"
}

CRITICAL: price_comparison must be EXACTLY one of: "cheaper", "similar", "more_expensive"
CRITICAL: quality_comparison must be EXACTLY one of: "better", "similar", "good"

Only suggest well-known, authentic Indian brands."#;

const VALIDATE_PRODUCT_TEMPLATE: &str = r#"You are a strict product data validator. Analyze the OpenFoodFacts product JSON and return ONLY valid JSON with these exact keys:
{
  "barcode": "<string>",
  "name": "<string>",
  "brand": "<string>",
  "categories": "<string>",
  "countries": "<comma separated countries>",
  "is_indian": "true|false|unknown",
  "reason": "<short explanation>",
  "confidence": "low|medium|high",
  "source_urls": ["<url1>", "<url2>"]
}

Rules:
- is_indian should be "true" if product is manufactured in India OR brand is Indian-owned
- is_indian should be "false" if brand is foreign-owned (even if manufactured in India)
- confidence should be "high" only if you're certain based on the data
- Include source_urls if you have references

OpenFoodFacts Data:
{{ payload }}"#;

const RETRIEVE_PRODUCT_TEMPLATE: &str = r#"You are a product retriever. Search for product with barcode "{{ barcode }}". Return ONLY valid JSON:
{
  "barcode": "{{ barcode }}",
  "name": "<product name>",
  "brand": "<brand name>",
  "categories": "<categories>",
  "countries": "<countries>",
  "is_indian": "true|false|unknown",
  "confidence": "low|medium|high",
  "source_urls": ["<authoritative url1>", "<url2>"]
}

IMPORTANT: Only return confidence "high" if you found authoritative sources (manufacturer website, major retailer). Include source_urls. If you can't find reliable information, return confidence "low"."#;

const ESTIMATE_PRICE_TEMPLATE: &str = r#"You are a product data validator for the Indian retail market. Estimate a realistic retail price in Indian Rupees (INR).

Product Details:
- Name: {{ name }}
- Brand: {{ brand }}
- Category: {{ category }}
- Country of Origin: {{ country_of_origin }}
- Is Indian Product: {{ is_indian }}
- Weight/Quantity: {{ quantity }}

Instructions:
- Estimate average Indian retail market price
- For foreign products, consider import markup (typically 1.5-2x base price)
- Consider brand popularity and positioning (premium vs mass market)
- Account for size/volume in pricing
- Use realistic Indian retail context (not international MRP)

Return ONLY a number representing the price in INR. No currency symbols, no text, just the number.
Example: 120"#;

const SEARCH_PRODUCTS_TEMPLATE: &str = r#"You are a product search assistant. Find up to 5 real products matching: {{ query }}{% if category %} in category {{ category }}{% endif %}{% if indian_only %} (Indian products only){% endif %}.

Return ONLY a JSON array. Each entry must have:
{
  "name": "<product name>",
  "brand": "<brand>",
  "country_of_origin": "<country>",
  "category": "<category>",
  "price": <estimated INR as number>,
  "description": "<one sentence>",
  "availability": "<availability>",
  "where_to_buy": ["<store>"],
  "rating": <0-5>
}"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template failed to render: {0}")]
    Render(#[from] tera::Error),
    #[error("prompt payload could not be serialized: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Which prompting strategy a suggestion run uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Pick and justify the best of the supplied candidates.
    Ranking,
    /// No candidates exist; invent domestic alternatives.
    Generation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub mode: PromptMode,
    pub text: String,
}

/// Source product fields shown to the generator.
#[derive(Clone, Debug)]
pub struct SourceProductPrompt<'a> {
    pub name: &'a str,
    pub brand: &'a str,
    pub category: &'a str,
    pub price: Decimal,
}

#[derive(Serialize)]
struct CandidateLine<'a> {
    name: &'a str,
    brand: &'a str,
    category: &'a str,
    price: String,
}

/// Product fields for a price estimate.
#[derive(Clone, Debug, Serialize)]
pub struct PriceEstimateDetails {
    pub name: String,
    pub brand: String,
    pub category: String,
    pub country_of_origin: String,
    pub is_indian: bool,
    pub quantity: Option<String>,
}

pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(vec![
            (RANK_ALTERNATIVES, RANK_ALTERNATIVES_TEMPLATE),
            (GENERATE_ALTERNATIVES, GENERATE_ALTERNATIVES_TEMPLATE),
            (VALIDATE_PRODUCT, VALIDATE_PRODUCT_TEMPLATE),
            (RETRIEVE_PRODUCT, RETRIEVE_PRODUCT_TEMPLATE),
            (ESTIMATE_PRICE, ESTIMATE_PRICE_TEMPLATE),
            (SEARCH_PRODUCTS, SEARCH_PRODUCTS_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    /// Ranking mode when `candidates` is non-empty, generation mode otherwise.
    pub fn alternatives(
        &self,
        source: &SourceProductPrompt<'_>,
        candidates: &[ScoredCandidate],
    ) -> Result<RenderedPrompt, PromptError> {
        let mut context = Context::new();
        context.insert("product_name", source.name);
        context.insert("product_category", source.category);
        context.insert("product_brand", &or_unknown(source.brand));
        context.insert("source_price", &display_price(source.price));
        context.insert("comparison_contract", COMPARISON_CONTRACT);

        if candidates.is_empty() {
            let text = self.tera.render(GENERATE_ALTERNATIVES, &context)?;
            return Ok(RenderedPrompt { mode: PromptMode::Generation, text });
        }

        let lines: Vec<CandidateLine<'_>> = candidates
            .iter()
            .take(PROMPT_CANDIDATE_LIMIT)
            .map(|candidate| CandidateLine {
                name: &candidate.product.name,
                brand: &candidate.product.brand,
                category: &candidate.product.category,
                price: candidate.product.price.normalize().to_string(),
            })
            .collect();
        context.insert("candidates", &lines);

        let text = self.tera.render(RANK_ALTERNATIVES, &context)?;
        Ok(RenderedPrompt { mode: PromptMode::Ranking, text })
    }

    pub fn validate_product(&self, payload: &Value) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("payload", &serde_json::to_string_pretty(payload)?);
        Ok(self.tera.render(VALIDATE_PRODUCT, &context)?)
    }

    pub fn retrieve_product(&self, barcode: &str) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("barcode", barcode);
        Ok(self.tera.render(RETRIEVE_PRODUCT, &context)?)
    }

    pub fn estimate_price(&self, details: &PriceEstimateDetails) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("name", &or_unknown(&details.name));
        context.insert("brand", &or_unknown(&details.brand));
        context.insert("category", &or_unknown(&details.category));
        context.insert("country_of_origin", &or_unknown(&details.country_of_origin));
        context.insert("is_indian", &details.is_indian);
        context.insert("quantity", &or_unknown(details.quantity.as_deref().unwrap_or_default()));
        Ok(self.tera.render(ESTIMATE_PRICE, &context)?)
    }

    pub fn search_products(
        &self,
        query: &str,
        category: Option<&str>,
        indian_only: bool,
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("query", query);
        context.insert("category", &category);
        context.insert("indian_only", &indian_only);
        Ok(self.tera.render(SEARCH_PRODUCTS, &context)?)
    }
}

fn or_unknown(value: &str) -> String {
    if value.trim().is_empty() {
        "Unknown".to_string()
    } else {
        value.to_string()
    }
}

fn display_price(price: Decimal) -> String {
    if price > Decimal::ZERO {
        price.normalize().to_string()
    } else {
        "Unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{PriceEstimateDetails, PromptLibrary, PromptMode, SourceProductPrompt};
    use crate::alternatives::scoring::ScoredCandidate;
    use crate::domain::product::{Product, ProductId};

    fn source() -> SourceProductPrompt<'static> {
        SourceProductPrompt {
            name: "Coca-Cola Classic",
            brand: "Coca-Cola",
            category: "Beverages",
            price: Decimal::ZERO,
        }
    }

    fn candidate(index: usize) -> ScoredCandidate {
        ScoredCandidate {
            product: Product {
                id: ProductId(format!("p-{index}")),
                barcode: format!("890{index}"),
                name: format!("Cola {index}"),
                brand: format!("Desi {index}"),
                category: "Beverages".to_string(),
                country_of_origin: "India".to_string(),
                is_indian: true,
                description: None,
                image_url: None,
                price: Decimal::new(2500, 2),
                availability: "widely_available".to_string(),
                where_to_buy: Vec::new(),
                rating: None,
                source: None,
                confidence: None,
                verified: false,
                off_raw: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            nutrition_distance: index as f64,
        }
    }

    #[test]
    fn empty_candidate_list_selects_generation_mode() {
        let library = PromptLibrary::new().expect("templates");
        let prompt = library.alternatives(&source(), &[]).expect("render");

        assert_eq!(prompt.mode, PromptMode::Generation);
        assert!(prompt.text.contains("\"Coca-Cola Classic\" by Coca-Cola in category Beverages"));
        assert!(prompt.text.contains("(Rs Unknown)"));
        assert!(prompt.text.contains("\"more_expensive\""));
    }

    #[test]
    fn ranking_mode_lists_at_most_five_candidates() {
        let library = PromptLibrary::new().expect("templates");
        let candidates: Vec<ScoredCandidate> = (1..=7).map(candidate).collect();
        let prompt = library.alternatives(&source(), &candidates).expect("render");

        assert_eq!(prompt.mode, PromptMode::Ranking);
        assert!(prompt.text.contains("1. Cola 1 by Desi 1 - Beverages - Rs 25"));
        assert!(prompt.text.contains("5. Cola 5 by Desi 5"));
        assert!(!prompt.text.contains("Cola 6"));
        assert!(prompt.text.contains("Original product price: Rs Unknown"));
    }

    #[test]
    fn validation_prompt_embeds_payload() {
        let library = PromptLibrary::new().expect("templates");
        let text =
            library.validate_product(&json!({ "code": "5449000000996" })).expect("render");
        assert!(text.contains("\"code\": \"5449000000996\""));
    }

    #[test]
    fn search_prompt_mentions_filters_only_when_set() {
        let library = PromptLibrary::new().expect("templates");
        let plain = library.search_products("basmati rice", None, false).expect("render");
        let filtered =
            library.search_products("basmati rice", Some("Grains"), true).expect("render");

        assert!(!plain.contains("in category"));
        assert!(filtered.contains("in category Grains (Indian products only)"));
    }

    #[test]
    fn price_prompt_fills_unknown_fields() {
        let library = PromptLibrary::new().expect("templates");
        let text = library
            .estimate_price(&PriceEstimateDetails {
                name: "Maggi".to_string(),
                brand: String::new(),
                category: "Noodles".to_string(),
                country_of_origin: "India".to_string(),
                is_indian: true,
                quantity: None,
            })
            .expect("render");

        assert!(text.contains("- Brand: Unknown"));
        assert!(text.contains("- Weight/Quantity: Unknown"));
        assert!(text.contains("- Is Indian Product: true"));
    }
}
