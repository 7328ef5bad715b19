use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use vocalkart_core::domain::alternative::{
    AlternativeDetail, AlternativeId, AlternativeLink, NewAlternativeLink, PriceComparison,
    QualityComparison,
};
use vocalkart_core::domain::product::{ConfidenceTier, ProductId};

use super::product::{decode_json, encode_json, parse_timestamp, product_from_row};
use super::{AlternativeRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAlternativeRepository {
    pool: DbPool,
}

impl SqlAlternativeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlternativeRepository for SqlAlternativeRepository {
    async fn insert(&self, link: NewAlternativeLink) -> Result<AlternativeLink, RepositoryError> {
        let link = link.into_link(AlternativeId::generate(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO alternatives (
                id, original_product_id, indian_product_id, match_score, reason,
                quality_comparison, price_comparison, reason_tags, confidence,
                source_urls, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id.0)
        .bind(&link.original_product_id.0)
        .bind(&link.indian_product_id.0)
        .bind(i64::from(link.match_score))
        .bind(&link.reason)
        .bind(link.quality_comparison.as_str())
        .bind(link.price_comparison.as_str())
        .bind(encode_json(&link.reason_tags)?)
        .bind(link.confidence.map(|confidence| confidence.as_str()))
        .bind(encode_json(&link.source_urls)?)
        .bind(link.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(link)
    }

    async fn list_for_product(
        &self,
        original: &ProductId,
    ) -> Result<Vec<AlternativeDetail>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.id, a.original_product_id, a.indian_product_id, a.match_score, a.reason,
                a.quality_comparison, a.price_comparison, a.reason_tags, a.confidence,
                a.source_urls, a.created_at,
                p.id AS p_id, p.barcode AS p_barcode, p.name AS p_name, p.brand AS p_brand,
                p.category AS p_category, p.country_of_origin AS p_country_of_origin,
                p.is_indian AS p_is_indian, p.description AS p_description,
                p.image_url AS p_image_url, p.price AS p_price,
                p.availability AS p_availability, p.where_to_buy AS p_where_to_buy,
                p.rating AS p_rating, p.source AS p_source, p.confidence AS p_confidence,
                p.verified AS p_verified, p.off_raw AS p_off_raw,
                p.created_at AS p_created_at, p.updated_at AS p_updated_at
            FROM alternatives a
            JOIN products p ON p.id = a.indian_product_id
            WHERE a.original_product_id = ?
            ORDER BY a.created_at DESC, a.rowid DESC
            "#,
        )
        .bind(&original.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AlternativeDetail {
                    link: link_from_row(row)?,
                    indian_product: product_from_row(row, "p_")?,
                })
            })
            .collect()
    }
}

fn link_from_row(row: &SqliteRow) -> Result<AlternativeLink, RepositoryError> {
    let match_score: i64 = row.try_get("match_score")?;
    let quality: String = row.try_get("quality_comparison")?;
    let price: String = row.try_get("price_comparison")?;
    let reason_tags: String = row.try_get("reason_tags")?;
    let confidence: Option<String> = row.try_get("confidence")?;
    let source_urls: String = row.try_get("source_urls")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AlternativeLink {
        id: AlternativeId(row.try_get("id")?),
        original_product_id: ProductId(row.try_get("original_product_id")?),
        indian_product_id: ProductId(row.try_get("indian_product_id")?),
        match_score: u8::try_from(match_score)
            .map_err(|_| RepositoryError::Decode(format!("invalid match_score: {match_score}")))?,
        reason: row.try_get("reason")?,
        quality_comparison: QualityComparison::from_literal(&quality).ok_or_else(|| {
            RepositoryError::Decode(format!("invalid quality_comparison: {quality}"))
        })?,
        price_comparison: PriceComparison::from_literal(&price)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid price_comparison: {price}")))?,
        reason_tags: decode_json("reason_tags", &reason_tags)?,
        confidence: confidence
            .map(|raw| {
                ConfidenceTier::parse(&raw)
                    .ok_or_else(|| RepositoryError::Decode(format!("invalid confidence: {raw}")))
            })
            .transpose()?,
        source_urls: decode_json("source_urls", &source_urls)?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use vocalkart_core::domain::alternative::{
        NewAlternativeLink, PriceComparison, QualityComparison,
    };
    use vocalkart_core::domain::product::{ConfidenceTier, NewProduct, Product, ProductId};

    use super::SqlAlternativeRepository;
    use crate::repositories::{AlternativeRepository, ProductRepository, SqlProductRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn insert_product(pool: &DbPool, barcode: &str, name: &str, is_indian: bool) -> Product {
        SqlProductRepository::new(pool.clone())
            .insert(NewProduct {
                barcode: barcode.to_string(),
                name: name.to_string(),
                brand: "Brand".to_string(),
                category: "Beverages".to_string(),
                country_of_origin: "India".to_string(),
                is_indian,
                description: None,
                image_url: None,
                price: Decimal::from(20),
                availability: "widely_available".to_string(),
                where_to_buy: Vec::new(),
                rating: None,
                source: None,
                confidence: None,
                verified: false,
                off_raw: None,
            })
            .await
            .expect("insert product")
    }

    fn new_link(original: &ProductId, indian: &ProductId, score: u8) -> NewAlternativeLink {
        NewAlternativeLink {
            original_product_id: original.clone(),
            indian_product_id: indian.clone(),
            match_score: score,
            reason: "Comparable taste at a lower price".to_string(),
            quality_comparison: QualityComparison::Good,
            price_comparison: PriceComparison::MoreExpensive,
            reason_tags: vec!["same_category".to_string(), "popular_brand".to_string()],
            confidence: Some(ConfidenceTier::High),
            source_urls: vec!["https://example.in/frooti".to_string()],
        }
    }

    #[tokio::test]
    async fn insert_and_list_joins_the_suggested_product() {
        let pool = setup_pool().await;
        let coke = insert_product(&pool, "1", "Coke", false).await;
        let frooti = insert_product(&pool, "2", "Frooti", true).await;
        let repo = SqlAlternativeRepository::new(pool.clone());

        let created = repo.insert(new_link(&coke.id, &frooti.id, 88)).await.expect("insert link");
        let listed = repo.list_for_product(&coke.id).await.expect("list");

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].link, created);
        assert_eq!(listed[0].indian_product, frooti);
        assert!(repo.list_for_product(&frooti.id).await.expect("empty").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn repeated_links_for_the_same_pair_are_not_deduplicated() {
        let pool = setup_pool().await;
        let coke = insert_product(&pool, "1", "Coke", false).await;
        let frooti = insert_product(&pool, "2", "Frooti", true).await;
        let repo = SqlAlternativeRepository::new(pool.clone());

        let first = repo.insert(new_link(&coke.id, &frooti.id, 80)).await.expect("first");
        let second = repo.insert(new_link(&coke.id, &frooti.id, 81)).await.expect("second");

        let listed = repo.list_for_product(&coke.id).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].link.id, second.id);
        assert_eq!(listed[1].link.id, first.id);

        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_product_reference_is_rejected_by_foreign_key() {
        let pool = setup_pool().await;
        let coke = insert_product(&pool, "1", "Coke", false).await;
        let repo = SqlAlternativeRepository::new(pool.clone());

        let result = repo.insert(new_link(&coke.id, &ProductId("ghost".to_string()), 70)).await;
        assert!(result.is_err());

        pool.close().await;
    }

    #[tokio::test]
    async fn out_of_vocabulary_labels_are_rejected_by_the_schema() {
        let pool = setup_pool().await;
        let coke = insert_product(&pool, "1", "Coke", false).await;
        let frooti = insert_product(&pool, "2", "Frooti", true).await;

        let result = sqlx::query(
            "INSERT INTO alternatives (id, original_product_id, indian_product_id, match_score,
                 reason, quality_comparison, price_comparison, created_at)
             VALUES ('raw', ?, ?, 50, 'r', 'Cheaper', 'similar', '2026-01-01T00:00:00Z')",
        )
        .bind(&coke.id.0)
        .bind(&frooti.id.0)
        .execute(&pool)
        .await;
        assert!(result.is_err());

        pool.close().await;
    }
}
