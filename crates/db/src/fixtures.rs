//! Deterministic demo catalog used by `vocalkart seed` and integration tests.
//!
//! A handful of foreign products with nutrition payloads, plus domestic products
//! in overlapping categories so that ranking mode has something to rank.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use vocalkart_core::domain::product::{ConfidenceTier, NewProduct, ProductSource};

use crate::repositories::{ProductRepository, RepositoryError};

struct DemoProduct {
    barcode: &'static str,
    name: &'static str,
    brand: &'static str,
    category: &'static str,
    country: &'static str,
    price: i64,
    energy_kcal: f64,
    sugars: f64,
    fat: f64,
}

const FOREIGN: &[DemoProduct] = &[
    DemoProduct {
        barcode: "5449000000996",
        name: "Coca-Cola Classic 300ml",
        brand: "Coca-Cola",
        category: "Beverages, Carbonated drinks, Sodas",
        country: "United States",
        price: 40,
        energy_kcal: 42.0,
        sugars: 10.6,
        fat: 0.0,
    },
    DemoProduct {
        barcode: "5053990101573",
        name: "Lay's Classic Salted",
        brand: "Lays",
        category: "Snacks, Chips",
        country: "United States",
        price: 20,
        energy_kcal: 536.0,
        sugars: 0.6,
        fat: 34.6,
    },
    DemoProduct {
        barcode: "3017620422003",
        name: "Nutella Hazelnut Spread",
        brand: "Ferrero",
        category: "Spreads, Sweet spreads",
        country: "Italy",
        price: 399,
        energy_kcal: 539.0,
        sugars: 56.3,
        fat: 30.9,
    },
];

const DOMESTIC: &[DemoProduct] = &[
    DemoProduct {
        barcode: "8901764012273",
        name: "Thums Up",
        brand: "Thums Up",
        category: "Beverages, Carbonated drinks",
        country: "India",
        price: 40,
        energy_kcal: 43.0,
        sugars: 10.8,
        fat: 0.0,
    },
    DemoProduct {
        barcode: "8904043901015",
        name: "Bovonto",
        brand: "Kali Aerated Water Works",
        category: "Beverages, Sodas",
        country: "India",
        price: 25,
        energy_kcal: 48.0,
        sugars: 12.0,
        fat: 0.0,
    },
    DemoProduct {
        barcode: "8906001050019",
        name: "Frooti Mango Drink",
        brand: "Parle Agro",
        category: "Beverages, Fruit juices",
        country: "India",
        price: 20,
        energy_kcal: 62.0,
        sugars: 14.6,
        fat: 0.0,
    },
    DemoProduct {
        barcode: "8904004400267",
        name: "Aloo Bhujia",
        brand: "Haldiram's",
        category: "Snacks, Namkeen",
        country: "India",
        price: 55,
        energy_kcal: 560.0,
        sugars: 2.0,
        fat: 37.0,
    },
    DemoProduct {
        barcode: "8901725133979",
        name: "Bingo Mad Angles",
        brand: "ITC",
        category: "Snacks, Chips",
        country: "India",
        price: 20,
        energy_kcal: 520.0,
        sugars: 3.1,
        fat: 28.0,
    },
];

impl DemoProduct {
    fn to_new_product(&self, is_indian: bool) -> NewProduct {
        NewProduct {
            barcode: self.barcode.to_string(),
            name: self.name.to_string(),
            brand: self.brand.to_string(),
            category: self.category.to_string(),
            country_of_origin: self.country.to_string(),
            is_indian,
            description: None,
            image_url: None,
            price: Decimal::from(self.price),
            availability: "widely_available".to_string(),
            where_to_buy: vec!["Local Stores".to_string()],
            rating: None,
            source: Some(ProductSource::Import),
            confidence: Some(ConfidenceTier::High),
            verified: true,
            off_raw: Some(json!({
                "code": self.barcode,
                "nutriments": {
                    "energy-kcal_100g": self.energy_kcal,
                    "sugars_100g": self.sugars,
                    "fat_100g": self.fat,
                }
            })),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub products_seeded: usize,
    pub foreign: usize,
    pub domestic: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub missing_barcodes: Vec<String>,
}

pub struct DemoCatalog;

impl DemoCatalog {
    pub fn barcodes() -> impl Iterator<Item = &'static str> {
        FOREIGN.iter().chain(DOMESTIC.iter()).map(|product| product.barcode)
    }

    /// Upserts every demo product by barcode; running it twice is harmless.
    pub async fn load(products: &dyn ProductRepository) -> Result<SeedResult, RepositoryError> {
        for product in FOREIGN {
            products.upsert_by_barcode(product.to_new_product(false)).await?;
        }
        for product in DOMESTIC {
            products.upsert_by_barcode(product.to_new_product(true)).await?;
        }

        Ok(SeedResult {
            products_seeded: FOREIGN.len() + DOMESTIC.len(),
            foreign: FOREIGN.len(),
            domestic: DOMESTIC.len(),
        })
    }

    pub async fn verify(
        products: &dyn ProductRepository,
    ) -> Result<VerificationResult, RepositoryError> {
        let mut missing_barcodes = Vec::new();
        for barcode in Self::barcodes() {
            if products.find_by_barcode(barcode).await?.is_none() {
                missing_barcodes.push(barcode.to_string());
            }
        }

        Ok(VerificationResult { all_present: missing_barcodes.is_empty(), missing_barcodes })
    }
}

#[cfg(test)]
mod tests {
    use super::DemoCatalog;
    use crate::repositories::{InMemoryProductRepository, ProductRepository};

    #[tokio::test]
    async fn load_is_idempotent_and_verifiable() {
        let repo = InMemoryProductRepository::default();

        let before = DemoCatalog::verify(&repo).await.expect("verify empty");
        assert!(!before.all_present);

        let first = DemoCatalog::load(&repo).await.expect("first load");
        DemoCatalog::load(&repo).await.expect("second load");

        assert_eq!(repo.count().await.expect("count"), first.products_seeded as u64);
        assert!(DemoCatalog::verify(&repo).await.expect("verify").all_present);
    }

    #[tokio::test]
    async fn domestic_beverages_are_candidates_for_cola() {
        let repo = InMemoryProductRepository::default();
        DemoCatalog::load(&repo).await.expect("load");

        let candidates =
            repo.find_domestic_by_category("Beverages", 200).await.expect("candidates");
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|product| product.is_indian));
    }
}
