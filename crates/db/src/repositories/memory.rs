use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use vocalkart_core::domain::alternative::{
    AlternativeDetail, AlternativeId, AlternativeLink, NewAlternativeLink,
};
use vocalkart_core::domain::product::{NewProduct, Product, ProductId};

use super::{AlternativeRepository, ProductRepository, ProductSearch, RepositoryError};

/// Products kept in insertion order, mirroring `ORDER BY rowid`.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<Product> {
        self.products.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.id == id).cloned())
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| product.barcode == barcode).cloned())
    }

    async fn find_by_name_and_brand(
        &self,
        name: &str,
        brand: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .find(|product| product.name == name && product.brand == brand)
            .cloned())
    }

    async fn find_domestic_by_category(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|product| product.is_indian && contains_folded(&product.category, term))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn search(&self, search: &ProductSearch) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|product| contains_folded(&product.name, &search.query))
            .filter(|product| {
                search
                    .category
                    .as_ref()
                    .map_or(true, |category| contains_folded(&product.category, category))
            })
            .filter(|product| !search.domestic_only || product.is_indian)
            .take(search.limit as usize)
            .cloned()
            .collect())
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        if products.iter().any(|existing| existing.barcode == product.barcode) {
            return Err(RepositoryError::Conflict(format!(
                "barcode `{}` already exists",
                product.barcode
            )));
        }
        let product = product.into_product(ProductId::generate(), Utc::now());
        products.push(product.clone());
        Ok(product)
    }

    async fn upsert_by_barcode(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let now = Utc::now();

        if let Some(existing) = products.iter_mut().find(|p| p.barcode == product.barcode) {
            let price = if product.price > Decimal::ZERO { product.price } else { existing.price };
            let mut updated = product.into_product(existing.id.clone(), existing.created_at);
            updated.price = price;
            updated.updated_at = now;
            *existing = updated.clone();
            return Ok(updated);
        }

        let product = product.into_product(ProductId::generate(), now);
        products.push(product.clone());
        Ok(product)
    }

    async fn update_price(
        &self,
        id: &ProductId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.products.write().await;
        Ok(products.iter_mut().find(|product| &product.id == id).map(|product| {
            product.price = price;
            product.updated_at = Utc::now();
            product.clone()
        }))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.products.read().await.len() as u64)
    }
}

/// Links kept in insertion order. Product references are checked against the
/// shared product repository, standing in for the foreign keys.
pub struct InMemoryAlternativeRepository {
    products: Arc<InMemoryProductRepository>,
    links: RwLock<Vec<AlternativeLink>>,
}

impl InMemoryAlternativeRepository {
    pub fn new(products: Arc<InMemoryProductRepository>) -> Self {
        Self { products, links: RwLock::new(Vec::new()) }
    }

    pub async fn snapshot(&self) -> Vec<AlternativeLink> {
        self.links.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AlternativeRepository for InMemoryAlternativeRepository {
    async fn insert(&self, link: NewAlternativeLink) -> Result<AlternativeLink, RepositoryError> {
        for id in [&link.original_product_id, &link.indian_product_id] {
            if self.products.find_by_id(id).await?.is_none() {
                return Err(RepositoryError::Conflict(format!("product `{id}` does not exist")));
            }
        }

        let link = link.into_link(AlternativeId::generate(), Utc::now());
        self.links.write().await.push(link.clone());
        Ok(link)
    }

    async fn list_for_product(
        &self,
        original: &ProductId,
    ) -> Result<Vec<AlternativeDetail>, RepositoryError> {
        let links: Vec<AlternativeLink> = self
            .links
            .read()
            .await
            .iter()
            .rev()
            .filter(|link| &link.original_product_id == original)
            .cloned()
            .collect();

        let mut details = Vec::with_capacity(links.len());
        for link in links {
            if let Some(indian_product) = self.products.find_by_id(&link.indian_product_id).await? {
                details.push(AlternativeDetail { link, indian_product });
            }
        }
        Ok(details)
    }
}

/// Substring match with ASCII-only case folding, the same folding SQLite's
/// `lower()` applies in the SQL repository.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}
