use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::product::CatalogEntry;

/// Read-only access to authoritative product records.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Returns one record per distinct id found. Unknown ids are simply absent.
    async fn find_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<CatalogEntry>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Catalog held in process memory, for tests and database-less runs.
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<Uuid, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    /// Inserts or replaces a record, e.g. to simulate a price change.
    pub async fn upsert(&self, entry: CatalogEntry) {
        self.entries.write().await.insert(entry.id, entry);
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn find_by_ids(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<CatalogEntry>, Box<dyn std::error::Error + Send + Sync>> {
        let entries = self.entries.read().await;
        let mut seen = HashSet::new();

        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| entries.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_find_by_ids_collapses_duplicates_and_skips_unknown() {
        let a = CatalogEntry::new(Uuid::new_v4(), "Cable", Decimal::new(500, 2), "SN-A");
        let b = CatalogEntry::new(Uuid::new_v4(), "Switch", Decimal::new(4200, 2), "SN-B");
        let catalog = InMemoryCatalog::with_entries([a.clone(), b.clone()]);

        let found = catalog
            .find_by_ids(&[a.id, a.id, Uuid::new_v4(), b.id])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.contains(&a));
        assert!(found.contains(&b));
    }

    #[tokio::test]
    async fn test_upsert_replaces_price() {
        let id = Uuid::new_v4();
        let catalog = InMemoryCatalog::new();
        catalog.upsert(CatalogEntry::new(id, "Cable", Decimal::new(500, 2), "SN-A")).await;
        catalog.upsert(CatalogEntry::new(id, "Cable", Decimal::new(650, 2), "SN-A")).await;

        let found = catalog.find_by_ids(&[id]).await.unwrap();
        assert_eq!(found[0].price, Decimal::new(650, 2));
    }
}
