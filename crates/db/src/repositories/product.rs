use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row};

use vocalkart_core::domain::product::{
    ConfidenceTier, NewProduct, Product, ProductId, ProductSource,
};

use super::{ProductRepository, ProductSearch, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, barcode, name, brand, category, country_of_origin, is_indian, \
     description, image_url, price, availability, where_to_buy, rating, source, confidence, \
     verified, off_raw, created_at, updated_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE {clause} LIMIT 1");
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|row| product_from_row(&row, "")).transpose()
    }
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        self.fetch_one_where("id = ?", &[id.0.as_str()]).await
    }

    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, RepositoryError> {
        self.fetch_one_where("barcode = ?", &[barcode]).await
    }

    async fn find_by_name_and_brand(
        &self,
        name: &str,
        brand: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        self.fetch_one_where("name = ? AND brand = ?", &[name, brand]).await
    }

    async fn find_domestic_by_category(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE is_indian = 1 AND instr(lower(category), lower(?)) > 0
             ORDER BY rowid
             LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(term)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| product_from_row(row, "")).collect()
    }

    async fn search(&self, search: &ProductSearch) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE instr(lower(name), lower(?1)) > 0
               AND (?2 IS NULL OR instr(lower(category), lower(?2)) > 0)
               AND (?3 = 0 OR is_indian = 1)
             ORDER BY rowid
             LIMIT ?4"
        );
        let rows = sqlx::query(&sql)
            .bind(&search.query)
            .bind(search.category.as_deref())
            .bind(search.domestic_only)
            .bind(i64::from(search.limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| product_from_row(row, "")).collect()
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let product = product.into_product(ProductId::generate(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO products (
                id, barcode, name, brand, category, country_of_origin, is_indian,
                description, image_url, price, availability, where_to_buy, rating,
                source, confidence, verified, off_raw, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id.0)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(&product.country_of_origin)
        .bind(product.is_indian)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.price.to_string())
        .bind(&product.availability)
        .bind(encode_json(&product.where_to_buy)?)
        .bind(product.rating)
        .bind(product.source.map(|source| source.as_str()))
        .bind(product.confidence.map(|confidence| confidence.as_str()))
        .bind(product.verified)
        .bind(product.off_raw.as_ref().map(encode_json).transpose()?)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| conflict_on_unique(error, &product.barcode))?;

        Ok(product)
    }

    async fn upsert_by_barcode(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let barcode = product.barcode.clone();
        let candidate = product.into_product(ProductId::generate(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO products (
                id, barcode, name, brand, category, country_of_origin, is_indian,
                description, image_url, price, availability, where_to_buy, rating,
                source, confidence, verified, off_raw, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(barcode) DO UPDATE SET
                name = excluded.name,
                brand = excluded.brand,
                category = excluded.category,
                country_of_origin = excluded.country_of_origin,
                is_indian = excluded.is_indian,
                description = excluded.description,
                image_url = excluded.image_url,
                price = CASE WHEN CAST(excluded.price AS REAL) > 0
                             THEN excluded.price ELSE products.price END,
                availability = excluded.availability,
                where_to_buy = excluded.where_to_buy,
                rating = excluded.rating,
                source = excluded.source,
                confidence = excluded.confidence,
                verified = excluded.verified,
                off_raw = excluded.off_raw,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&candidate.id.0)
        .bind(&candidate.barcode)
        .bind(&candidate.name)
        .bind(&candidate.brand)
        .bind(&candidate.category)
        .bind(&candidate.country_of_origin)
        .bind(candidate.is_indian)
        .bind(&candidate.description)
        .bind(&candidate.image_url)
        .bind(candidate.price.to_string())
        .bind(&candidate.availability)
        .bind(encode_json(&candidate.where_to_buy)?)
        .bind(candidate.rating)
        .bind(candidate.source.map(|source| source.as_str()))
        .bind(candidate.confidence.map(|confidence| confidence.as_str()))
        .bind(candidate.verified)
        .bind(candidate.off_raw.as_ref().map(encode_json).transpose()?)
        .bind(candidate.created_at.to_rfc3339())
        .bind(candidate.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_by_barcode(&barcode).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("upserted product `{barcode}` could not be read back"))
        })
    }

    async fn update_price(
        &self,
        id: &ProductId,
        price: Decimal,
    ) -> Result<Option<Product>, RepositoryError> {
        let result = sqlx::query("UPDATE products SET price = ?, updated_at = ? WHERE id = ?")
            .bind(price.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM products")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

/// Decodes a product from a row whose product columns carry `prefix`.
pub(crate) fn product_from_row(row: &SqliteRow, prefix: &str) -> Result<Product, RepositoryError> {
    let column = |name: &str| format!("{prefix}{name}");

    let price: String = row.try_get(column("price").as_str())?;
    let where_to_buy: String = row.try_get(column("where_to_buy").as_str())?;
    let source: Option<String> = row.try_get(column("source").as_str())?;
    let confidence: Option<String> = row.try_get(column("confidence").as_str())?;
    let off_raw: Option<String> = row.try_get(column("off_raw").as_str())?;
    let created_at: String = row.try_get(column("created_at").as_str())?;
    let updated_at: String = row.try_get(column("updated_at").as_str())?;

    Ok(Product {
        id: ProductId(row.try_get(column("id").as_str())?),
        barcode: row.try_get(column("barcode").as_str())?,
        name: row.try_get(column("name").as_str())?,
        brand: row.try_get(column("brand").as_str())?,
        category: row.try_get(column("category").as_str())?,
        country_of_origin: row.try_get(column("country_of_origin").as_str())?,
        is_indian: row.try_get(column("is_indian").as_str())?,
        description: row.try_get(column("description").as_str())?,
        image_url: row.try_get(column("image_url").as_str())?,
        price: price
            .parse::<Decimal>()
            .map_err(|e| RepositoryError::Decode(format!("invalid price `{price}`: {e}")))?,
        availability: row.try_get(column("availability").as_str())?,
        where_to_buy: decode_json("where_to_buy", &where_to_buy)?,
        rating: row.try_get(column("rating").as_str())?,
        source: source
            .map(|raw| {
                ProductSource::parse(&raw)
                    .ok_or_else(|| RepositoryError::Decode(format!("invalid source: {raw}")))
            })
            .transpose()?,
        confidence: confidence
            .map(|raw| {
                ConfidenceTier::parse(&raw)
                    .ok_or_else(|| RepositoryError::Decode(format!("invalid confidence: {raw}")))
            })
            .transpose()?,
        verified: row.try_get(column("verified").as_str())?,
        off_raw: off_raw.map(|raw| decode_json::<Value>("off_raw", &raw)).transpose()?,
        created_at: parse_timestamp("created_at", created_at)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

pub(crate) fn encode_json<T: serde::Serialize + ?Sized>(
    value: &T,
) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(format!("json encode: {e}")))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("invalid json in `{column}`: {e}")))
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

fn conflict_on_unique(error: sqlx::Error, barcode: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("barcode `{barcode}` already exists"))
        }
        _ => RepositoryError::Database(error),
    }
}
