use std::collections::HashSet;

use async_trait::async_trait;
use bazaar_catalog::{CatalogEntry, CatalogLookup};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Product records read from the `products` table. Prices here are the
/// only ones an order is ever charged.
pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    serialnumber: String,
    brand: Option<String>,
}

impl From<ProductRow> for CatalogEntry {
    fn from(row: ProductRow) -> Self {
        let entry = CatalogEntry::new(row.id, row.name, row.price, row.serialnumber);
        match row.brand {
            Some(brand) => entry.with_brand(brand),
            None => entry,
        }
    }
}

fn distinct(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[async_trait]
impl CatalogLookup for StoreCatalogRepository {
    async fn find_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<CatalogEntry>, Box<dyn std::error::Error + Send + Sync>> {
        let ids = distinct(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, price, serialnumber, brand FROM products WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogEntry::from).collect())
    }
}
