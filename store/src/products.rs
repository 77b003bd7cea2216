//! Product embedding persistence and similarity search.

use std::time::Duration;

use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::vector::vector_to_pg;

/// Optional conjunctive filters for similarity search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to one category.
    pub category: Option<String>,

    /// Lower price bound, inclusive.
    pub min_price: Option<f64>,

    /// Upper price bound, inclusive.
    pub max_price: Option<f64>,
}

/// A product row returned from similarity search.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductHit {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub image_url: String,
    pub category: String,

    /// Cosine similarity to the query vector, `1 - distance`.
    pub similarity: f64,
}

/// A product still missing at least one embedding column.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PendingProduct {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
}

/// Both embeddings for one product, ready to persist.
#[derive(Debug, Clone)]
pub struct ProductEmbeddings {
    pub id: Uuid,
    pub image: Vec<f32>,
    pub text: Vec<f32>,
}

/// Access to the products table.
///
/// Connections come from a bounded pool with a per-acquire timeout;
/// concurrent callers share it instead of serializing through one
/// handle.
pub struct ProductStore {
    pool: PgPool,
}

impl ProductStore {
    /// Connect with a bounded pool. The pool is lazy: the first
    /// operation establishes the connection, so construction never
    /// blocks on the database.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rank products by cosine similarity to `embedding`, most similar
    /// first. Filters are conjunctive; absent filters impose no
    /// constraint. Ties fall back to the store's natural row order.
    pub async fn search_similar(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        limit: i64,
    ) -> Result<Vec<ProductHit>> {
        let literal = vector_to_pg(embedding);
        let mut builder = search_builder(&literal, filter, limit);

        let hits = builder
            .build_query_as::<ProductHit>()
            .fetch_all(&self.pool)
            .await?;

        debug!("similarity search returned {} products", hits.len());
        Ok(hits)
    }

    /// Products missing either embedding column, up to `limit`.
    pub async fn pending_products(&self, limit: i64) -> Result<Vec<PendingProduct>> {
        let pending = sqlx::query_as::<_, PendingProduct>(
            "SELECT id, title, image_url FROM products \
             WHERE image_embedding IS NULL OR text_embedding IS NULL \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(pending)
    }

    /// Update one product's embedding columns. Absent vectors leave
    /// their column untouched; with neither supplied this is a no-op.
    pub async fn update_embeddings(
        &self,
        id: Uuid,
        image: Option<&[f32]>,
        text: Option<&[f32]>,
    ) -> Result<()> {
        if image.is_none() && text.is_none() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE products SET ");
        let mut updates = builder.separated(", ");
        if let Some(vector) = image {
            updates.push("image_embedding = ");
            updates.push_bind_unseparated(vector_to_pg(vector));
            updates.push_unseparated("::text::vector");
        }
        if let Some(vector) = text {
            updates.push("text_embedding = ");
            updates.push_bind_unseparated(vector_to_pg(vector));
            updates.push_unseparated("::text::vector");
        }
        updates.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        builder.build().execute(&self.pool).await?;

        debug!("updated embeddings for product {id}");
        Ok(())
    }

    /// Persist both embeddings for a batch of products inside one
    /// transaction.
    pub async fn batch_update_embeddings(&self, rows: &[ProductEmbeddings]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                "UPDATE products \
                 SET image_embedding = $1::text::vector, \
                     text_embedding = $2::text::vector, \
                     updated_at = NOW() \
                 WHERE id = $3",
            )
            .bind(vector_to_pg(&row.image))
            .bind(vector_to_pg(&row.text))
            .bind(row.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!("batch updated {} product embeddings", rows.len());
        Ok(rows.len())
    }
}

/// Build the similarity search query. Split out so the generated SQL
/// shape is testable without a live database.
fn search_builder<'a>(
    vector_literal: &'a str,
    filter: &'a SearchFilter,
    limit: i64,
) -> QueryBuilder<'a, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, title, price, image_url, category, \
         1 - (image_embedding <=> ",
    );
    builder.push_bind(vector_literal);
    builder.push(
        "::text::vector) AS similarity \
         FROM products WHERE image_embedding IS NOT NULL",
    );

    if let Some(category) = &filter.category {
        builder.push(" AND category = ");
        builder.push_bind(category.as_str());
    }
    if let Some(min_price) = filter.min_price {
        builder.push(" AND price >= ");
        builder.push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND price <= ");
        builder.push_bind(max_price);
    }

    builder.push(" ORDER BY image_embedding <=> ");
    builder.push_bind(vector_literal);
    builder.push("::text::vector ASC LIMIT ");
    builder.push_bind(limit);

    builder
}
