use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use vocalkart_core::domain::alternative::{AlternativeDetail, AlternativeLink, NewAlternativeLink};
use vocalkart_core::domain::product::{NewProduct, Product, ProductId};

pub mod alternative;
pub mod memory;
pub mod product;

pub use alternative::SqlAlternativeRepository;
pub use memory::{InMemoryAlternativeRepository, InMemoryProductRepository};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Filters for a name search over the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductSearch {
    pub query: String,
    /// Substring filter on category; `None` searches all categories.
    pub category: Option<String>,
    pub domestic_only: bool,
    pub limit: u32,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, RepositoryError>;

    /// Exact, case-sensitive match on both fields.
    async fn find_by_name_and_brand(
        &self,
        name: &str,
        brand: &str,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Domestic products whose category contains `term`, in insertion order.
    /// Case folding covers ASCII letters only.
    async fn find_domestic_by_category(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn search(&self, search: &ProductSearch) -> Result<Vec<Product>, RepositoryError>;

    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Inserts, or replaces the descriptive fields of the row with the same
    /// barcode. Id and creation time of an existing row are kept.
    async fn upsert_by_barcode(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    async fn update_price(
        &self,
        id: &ProductId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait AlternativeRepository: Send + Sync {
    async fn insert(&self, link: NewAlternativeLink) -> Result<AlternativeLink, RepositoryError>;

    /// Links recorded for `original`, newest first, with the suggested product.
    async fn list_for_product(
        &self,
        original: &ProductId,
    ) -> Result<Vec<AlternativeDetail>, RepositoryError>;
}
