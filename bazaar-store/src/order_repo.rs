use std::collections::HashMap;

use async_trait::async_trait;
use bazaar_order::{
    DailySales, Order, OrderItem, OrderOwner, OrderRepository, OrderWithOwner, PaymentResult,
    RepoResult, ShippingAddress,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Orders in Postgres: one `orders` row plus its `order_items` rows, always
/// written in the same transaction.
pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.shipping_address, o.payment_method, \
    o.payment_result, o.items_price, o.total_price, o.is_paid, o.paid_at, o.is_delivered, \
    o.delivered_at, o.created_at, o.updated_at";

const OWNER_COLUMNS: &str =
    "u.id AS owner_id, u.username AS owner_username, u.email AS owner_email";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_result: Option<Json<PaymentResult>>,
    items_price: Decimal,
    total_price: Decimal,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OwnedOrderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    owner_id: Option<Uuid>,
    owner_username: Option<String>,
    owner_email: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    #[allow(dead_code)]
    position: i32,
    product_id: Uuid,
    name: String,
    qty: i32,
    price: Decimal,
    serialnumber: String,
    brand: Option<String>,
    image: Option<String>,
}

impl OrderItemRow {
    fn into_item(self) -> RepoResult<OrderItem> {
        Ok(OrderItem {
            product: self.product_id,
            name: self.name,
            qty: u32::try_from(self.qty)?,
            price: self.price,
            serial_number: self.serialnumber,
            brand: self.brand,
            image: self.image,
        })
    }
}

fn assemble(row: OrderRow, items: Vec<OrderItemRow>) -> RepoResult<Order> {
    let order_items = items
        .into_iter()
        .map(OrderItemRow::into_item)
        .collect::<RepoResult<Vec<_>>>()?;

    Ok(Order {
        id: row.id,
        user: row.user_id,
        order_items,
        shipping_address: row.shipping_address.0,
        payment_method: row.payment_method,
        payment_result: row.payment_result.map(|r| r.0),
        items_price: row.items_price,
        total_price: row.total_price,
        is_paid: row.is_paid,
        paid_at: row.paid_at,
        is_delivered: row.is_delivered,
        delivered_at: row.delivered_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn owner_of(row: &OwnedOrderRow) -> Option<OrderOwner> {
    Some(OrderOwner {
        id: row.owner_id?,
        username: row.owner_username.clone()?,
        email: row.owner_email.clone()?,
    })
}

impl StoreOrderRepository {
    /// Items for many orders in one round trip, grouped by order, in position order.
    async fn load_items(&self, order_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, Vec<OrderItemRow>>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, position, product_id, name, qty, price, serialnumber, brand, image \
             FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn assemble_all(&self, rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                assemble(row, lines)
            })
            .collect()
    }

    async fn assemble_one(&self, row: Option<OrderRow>) -> RepoResult<Option<Order>> {
        match row {
            Some(row) => Ok(self.assemble_all(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn assemble_owned(&self, rows: Vec<OwnedOrderRow>) -> RepoResult<Vec<OrderWithOwner>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.order.id).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let owner = owner_of(&row);
                let lines = items.remove(&row.order.id).unwrap_or_default();
                Ok(OrderWithOwner {
                    order: assemble(row.order, lines)?,
                    owner,
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn insert(&self, order: &Order) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, shipping_address, payment_method, payment_result,
                                items_price, total_price, is_paid, paid_at, is_delivered,
                                delivered_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id)
        .bind(order.user)
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(order.payment_result.as_ref().map(Json))
        .bind(order.items_price)
        .bind(order.total_price)
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.is_delivered)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.order_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, name, qty, price,
                                         serialnumber, brand, image)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(order.id)
            .bind(i32::try_from(position)?)
            .bind(item.product)
            .bind(&item.name)
            .bind(i32::try_from(item.qty)?)
            .bind(item.price)
            .bind(&item.serial_number)
            .bind(&item.brand)
            .bind(&item.image)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders o WHERE o.id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        self.assemble_one(row).await
    }

    async fn find_with_owner(&self, id: Uuid) -> RepoResult<Option<OrderWithOwner>> {
        let row: Option<OwnedOrderRow> = sqlx::query_as(&format!(
            "SELECT {}, {} FROM orders o LEFT JOIN users u ON u.id = o.user_id WHERE o.id = $1",
            ORDER_COLUMNS, OWNER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble_owned(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_with_owner(&self) -> RepoResult<Vec<OrderWithOwner>> {
        let rows: Vec<OwnedOrderRow> = sqlx::query_as(&format!(
            "SELECT {}, {} FROM orders o LEFT JOIN users u ON u.id = o.user_id ORDER BY o.created_at",
            ORDER_COLUMNS, OWNER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.assemble_owned(rows).await
    }

    async fn list_by_owner(&self, owner: Uuid) -> RepoResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders o WHERE o.user_id = $1 ORDER BY o.created_at",
            ORDER_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        self.assemble_all(rows).await
    }

    async fn mark_paid(
        &self,
        id: Uuid,
        result: &PaymentResult,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<Order>> {
        // Delivery columns are left alone so a concurrent delivery survives.
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders AS o \
             SET is_paid = TRUE, paid_at = $2, payment_result = $3, updated_at = $2 \
             WHERE o.id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(at)
        .bind(Json(result))
        .fetch_optional(&self.pool)
        .await?;

        self.assemble_one(row).await
    }

    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders AS o \
             SET is_delivered = TRUE, delivered_at = $2, updated_at = $2 \
             WHERE o.id = $1 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        self.assemble_one(row).await
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM orders").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> RepoResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count)?)
    }

    async fn sum_total_price(&self) -> RepoResult<Decimal> {
        let total: Decimal = sqlx::query_scalar("SELECT COALESCE(SUM(total_price), 0) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn sales_by_day(&self, offset: FixedOffset) -> RepoResult<Vec<DailySales>> {
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            r#"
            SELECT ((paid_at AT TIME ZONE 'UTC') + make_interval(secs => $1))::date AS day,
                   SUM(total_price) AS total_sales
            FROM orders
            WHERE is_paid AND paid_at IS NOT NULL
            GROUP BY 1
            "#,
        )
        .bind(f64::from(offset.local_minus_utc()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, total_sales)| DailySales { day, total_sales })
            .collect())
    }
}
