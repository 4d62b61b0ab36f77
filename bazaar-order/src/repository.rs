use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{DailySales, Order, OrderWithOwner, PaymentResult};

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Persistence of orders. Every write touches exactly one order, and a
/// transition writes only the fields it owns so concurrent transitions on
/// the same order never undo each other.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order with all its items, or nothing.
    async fn insert(&self, order: &Order) -> RepoResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>>;

    async fn find_with_owner(&self, id: Uuid) -> RepoResult<Option<OrderWithOwner>>;

    async fn list_with_owner(&self) -> RepoResult<Vec<OrderWithOwner>>;

    async fn list_by_owner(&self, owner: Uuid) -> RepoResult<Vec<Order>>;

    /// Sets `is_paid`, `paid_at` and `payment_result` in one write and
    /// returns the updated order, or `None` if it does not exist.
    async fn mark_paid(
        &self,
        id: Uuid,
        result: &PaymentResult,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<Order>>;

    /// Sets `is_delivered` and `delivered_at` in one write.
    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<Option<Order>>;

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;

    async fn delete_all(&self) -> RepoResult<u64>;

    async fn count(&self) -> RepoResult<u64>;

    /// Sum of `total_price` over every order, paid or not.
    async fn sum_total_price(&self) -> RepoResult<Decimal>;

    /// Paid orders grouped by the calendar day of `paid_at` at `offset`,
    /// summing `total_price`. Order of the groups is unspecified.
    async fn sales_by_day(&self, offset: FixedOffset) -> RepoResult<Vec<DailySales>>;
}
