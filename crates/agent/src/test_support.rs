use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use vocalkart_core::domain::alternative::{AlternativeDetail, AlternativeLink, NewAlternativeLink};
use vocalkart_core::domain::product::{NewProduct, Product, ProductId};
use vocalkart_core::prompts::PromptLibrary;
use vocalkart_db::repositories::{
    AlternativeRepository, InMemoryAlternativeRepository, InMemoryProductRepository,
    ProductRepository, ProductSearch, RepositoryError,
};

use crate::lookup::{LookupProduct, ProductLookup};

pub(crate) struct Stores {
    pub products: Arc<InMemoryProductRepository>,
    pub alternatives: Arc<InMemoryAlternativeRepository>,
    pub prompts: Arc<PromptLibrary>,
}

impl Stores {
    pub fn new() -> Self {
        let products = Arc::new(InMemoryProductRepository::new());
        let alternatives = Arc::new(InMemoryAlternativeRepository::new(products.clone()));
        Self { products, alternatives, prompts: Arc::new(PromptLibrary::new().expect("prompts")) }
    }
}

pub(crate) fn new_product(
    barcode: &str,
    name: &str,
    brand: &str,
    category: &str,
    is_indian: bool,
    price: i64,
) -> NewProduct {
    NewProduct {
        barcode: barcode.to_string(),
        name: name.to_string(),
        brand: brand.to_string(),
        category: category.to_string(),
        country_of_origin: if is_indian { "India" } else { "United States" }.to_string(),
        is_indian,
        description: None,
        image_url: None,
        price: Decimal::from(price),
        availability: "widely_available".to_string(),
        where_to_buy: Vec::new(),
        rating: None,
        source: None,
        confidence: None,
        verified: false,
        off_raw: None,
    }
}

pub(crate) fn with_nutriments(
    mut product: NewProduct,
    energy: f64,
    sugars: f64,
    fat: f64,
) -> NewProduct {
    product.off_raw = Some(json!({
        "nutriments": { "energy-kcal_100g": energy, "sugars_100g": sugars, "fat_100g": fat }
    }));
    product
}

pub(crate) fn lookup_product(raw: Value) -> LookupProduct {
    LookupProduct::from_value(raw)
}

/// Lookup double with canned barcode and search results.
#[derive(Default)]
pub(crate) struct StubLookup {
    pub by_barcode: HashMap<String, LookupProduct>,
    pub search_results: Vec<LookupProduct>,
    pub unavailable: bool,
}

#[async_trait]
impl ProductLookup for StubLookup {
    async fn by_barcode(&self, barcode: &str) -> Result<Option<LookupProduct>> {
        if self.unavailable {
            bail!("lookup service unreachable");
        }
        Ok(self.by_barcode.get(barcode).cloned())
    }

    async fn search(&self, _query: &str) -> Result<Vec<LookupProduct>> {
        if self.unavailable {
            bail!("lookup service unreachable");
        }
        Ok(self.search_results.clone())
    }
}

/// Product store that refuses to insert one product name.
pub(crate) struct RefusingProducts {
    pub inner: Arc<InMemoryProductRepository>,
    pub refused_name: String,
}

#[async_trait]
impl ProductRepository for RefusingProducts {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, RepositoryError> {
        self.inner.find_by_barcode(barcode).await
    }

    async fn find_by_name_and_brand(
        &self,
        name: &str,
        brand: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        self.inner.find_by_name_and_brand(name, brand).await
    }

    async fn find_domestic_by_category(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        self.inner.find_domestic_by_category(term, limit).await
    }

    async fn search(&self, search: &ProductSearch) -> Result<Vec<Product>, RepositoryError> {
        self.inner.search(search).await
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        if product.name == self.refused_name {
            return Err(RepositoryError::Conflict(format!("cannot insert {}", product.name)));
        }
        self.inner.insert(product).await
    }

    async fn upsert_by_barcode(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        self.inner.upsert_by_barcode(product).await
    }

    async fn update_price(
        &self,
        id: &ProductId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError> {
        self.inner.update_price(id, price).await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.inner.count().await
    }
}

/// Link store that refuses links pointing at one product.
pub(crate) struct RefusingAlternatives {
    pub inner: Arc<InMemoryAlternativeRepository>,
    pub refused_target: ProductId,
}

#[async_trait]
impl AlternativeRepository for RefusingAlternatives {
    async fn insert(&self, link: NewAlternativeLink) -> Result<AlternativeLink, RepositoryError> {
        if link.indian_product_id == self.refused_target {
            return Err(RepositoryError::Conflict("link rejected".to_string()));
        }
        self.inner.insert(link).await
    }

    async fn list_for_product(
        &self,
        original: &ProductId,
    ) -> Result<Vec<AlternativeDetail>, RepositoryError> {
        self.inner.list_for_product(original).await
    }
}
