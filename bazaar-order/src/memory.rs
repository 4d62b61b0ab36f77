use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{DailySales, Order, OrderOwner, OrderWithOwner, PaymentResult};
use crate::repository::{OrderRepository, RepoResult};

/// Order store held in process memory, for tests and database-less runs.
/// Owners play the part of the user directory and are registered explicitly.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
    owners: RwLock<HashMap<Uuid, OrderOwner>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_owner(&self, owner: OrderOwner) {
        self.owners.write().await.insert(owner.id, owner);
    }

    async fn populate(&self, order: Order) -> OrderWithOwner {
        let owner = self.owners.read().await.get(&order.user).cloned();
        OrderWithOwner { order, owner }
    }

    async fn all_sorted(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.read().await.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> RepoResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(format!("duplicate order id {}", order.id).into());
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_with_owner(&self, id: Uuid) -> RepoResult<Option<OrderWithOwner>> {
        let order = self.orders.read().await.get(&id).cloned();
        match order {
            Some(order) => Ok(Some(self.populate(order).await)),
            None => Ok(None),
        }
    }

    async fn list_with_owner(&self) -> RepoResult<Vec<OrderWithOwner>> {
        let mut populated = Vec::new();
        for order in self.all_sorted().await {
            populated.push(self.populate(order).await);
        }
        Ok(populated)
    }

    async fn list_by_owner(&self, owner: Uuid) -> RepoResult<Vec<Order>> {
        Ok(self
            .all_sorted()
            .await
            .into_iter()
            .filter(|o| o.user == owner)
            .collect())
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        result: &PaymentResult,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        Ok(orders.get_mut(&id).map(|stored| {
            stored.mark_paid(result.clone(), at);
            stored.clone()
        }))
    }

    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        Ok(orders.get_mut(&id).map(|stored| {
            stored.mark_delivered(at);
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }

    async fn delete_all(&self) -> RepoResult<u64> {
        let mut orders = self.orders.write().await;
        let removed = orders.len() as u64;
        orders.clear();
        Ok(removed)
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.orders.read().await.len() as u64)
    }

    async fn sum_total_price(&self) -> RepoResult<Decimal> {
        Ok(self.orders.read().await.values().map(|o| o.total_price).sum())
    }

    async fn sales_by_day(&self, offset: FixedOffset) -> RepoResult<Vec<DailySales>> {
        let orders = self.orders.read().await;
        let mut days: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

        for order in orders.values().filter(|o| o.is_paid) {
            if let Some(paid_at) = order.paid_at {
                let day = paid_at.with_timezone(&offset).date_naive();
                *days.entry(day).or_insert(Decimal::ZERO) += order.total_price;
            }
        }

        Ok(days
            .into_iter()
            .map(|(day, total_sales)| DailySales { day, total_sales })
            .collect())
    }
}
