use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};
use vocalkart_core::catalog::pricing::FALLBACK_PRICE;
use vocalkart_core::catalog::parse_price_reply;
use vocalkart_core::domain::product::Product;
use vocalkart_core::prompts::{PriceEstimateDetails, PromptLibrary};
use vocalkart_db::repositories::ProductRepository;

use crate::llm::LlmClient;

/// Generator-backed price estimates for catalog rows without a usable price.
pub struct PriceBackfill {
    products: Arc<dyn ProductRepository>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl PriceBackfill {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        Self { products, llm, prompts }
    }

    /// Never fails: any generator problem yields the fallback price.
    pub async fn estimate(&self, details: &PriceEstimateDetails) -> Decimal {
        let prompt = match self.prompts.estimate_price(details) {
            Ok(prompt) => prompt,
            Err(error) => {
                warn!(error = %error, "price prompt failed to render");
                return Decimal::from(FALLBACK_PRICE);
            }
        };

        match self.llm.complete(&prompt).await {
            Ok(reply) => parse_price_reply(&reply),
            Err(error) => {
                warn!(
                    event_name = "pipeline.price.estimate_failed",
                    product = %details.name,
                    error = %error,
                    "price estimate failed, using fallback"
                );
                Decimal::from(FALLBACK_PRICE)
            }
        }
    }

    /// Prices every product whose price is zero or negative and writes the
    /// estimate back. If the write fails the returned copy still carries it.
    pub async fn backfill(&self, products: Vec<Product>) -> Vec<Product> {
        let mut priced = Vec::with_capacity(products.len());
        for mut product in products {
            if product.price > Decimal::ZERO {
                priced.push(product);
                continue;
            }

            let estimate = self.estimate(&details_of(&product)).await;
            debug!(product_id = %product.id, %estimate, "backfilling price");

            match self.products.update_price(&product.id, estimate).await {
                Ok(Some(updated)) => priced.push(updated),
                Ok(None) => {
                    product.price = estimate;
                    priced.push(product);
                }
                Err(error) => {
                    warn!(
                        event_name = "pipeline.price.update_failed",
                        product_id = %product.id,
                        error = %error,
                        "failed to store estimated price"
                    );
                    product.price = estimate;
                    priced.push(product);
                }
            }
        }
        priced
    }
}

fn details_of(product: &Product) -> PriceEstimateDetails {
    PriceEstimateDetails {
        name: product.name.clone(),
        brand: product.brand.clone(),
        category: product.category.clone(),
        country_of_origin: product.country_of_origin.clone(),
        is_indian: product.is_indian,
        quantity: None,
    }
}
