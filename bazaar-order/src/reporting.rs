use std::sync::Arc;

use chrono::FixedOffset;
use rust_decimal::Decimal;

use crate::error::OrderError;
use crate::models::DailySales;
use crate::repository::OrderRepository;

/// Aggregate figures over the order store.
///
/// `total_sales` counts every order while `sales_by_date` counts paid orders
/// only. The two are not expected to agree.
pub struct SalesReporter {
    orders: Arc<dyn OrderRepository>,
    offset: FixedOffset,
}

impl SalesReporter {
    /// `offset` fixes which calendar day a payment timestamp falls on.
    pub fn new(orders: Arc<dyn OrderRepository>, offset: FixedOffset) -> Self {
        Self { orders, offset }
    }

    pub async fn count_orders(&self) -> Result<u64, OrderError> {
        self.orders
            .count()
            .await
            .map_err(|e| OrderError::internal("order count", e))
    }

    pub async fn total_sales(&self) -> Result<Decimal, OrderError> {
        self.orders
            .sum_total_price()
            .await
            .map_err(|e| OrderError::internal("total sales", e))
    }

    pub async fn sales_by_date(&self) -> Result<Vec<DailySales>, OrderError> {
        self.orders
            .sales_by_day(self.offset)
            .await
            .map_err(|e| OrderError::internal("sales by date", e))
    }
}
