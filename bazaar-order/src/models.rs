use bazaar_catalog::OrderTotals;
use bazaar_core::Masked;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{ser::Error as _, Deserialize, Serialize, Serializer};
use uuid::Uuid;
use validator::Validate;

/// Postal destination; stored and surfaced as given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

/// Provider-reported payment identifiers, recorded verbatim (never verified).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentResult {
    pub id: Option<String>,
    pub status: Option<String>,
    pub update_time: Option<String>,
    pub email_address: Option<Masked<String>>,
}

/// A purchased line. `price` is the catalog unit price at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product: Uuid,
    pub name: String,
    pub qty: u32,
    pub price: Decimal,
    #[serde(rename = "serialnumber", alias = "serialNumber")]
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The price snapshot of a purchase and its payment/delivery progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_result: Option<PaymentResult>,
    pub items_price: Decimal,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user: Uuid,
        order_items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        payment_method: String,
        totals: OrderTotals,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user,
            order_items,
            shipping_address,
            payment_method,
            payment_result: None,
            items_price: totals.items_price,
            total_price: totals.total_price,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets `is_paid`, `paid_at` and `payment_result` together. Calling it
    /// again overwrites the timestamp and the result.
    pub fn mark_paid(&mut self, result: PaymentResult, at: DateTime<Utc>) {
        self.is_paid = true;
        self.paid_at = Some(at);
        self.payment_result = Some(result);
        self.updated_at = at;
    }

    /// Sets `is_delivered` and `delivered_at` together. Payment is not required.
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) {
        self.is_delivered = true;
        self.delivered_at = Some(at);
        self.updated_at = at;
    }
}

/// Owner details resolved from the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderOwner {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// An order whose `user` field is expanded to the owner record (`null` when
/// the owner no longer exists).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithOwner {
    pub order: Order,
    pub owner: Option<OrderOwner>,
}

impl Serialize for OrderWithOwner {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut value = serde_json::to_value(&self.order).map_err(S::Error::custom)?;
        let owner = serde_json::to_value(&self.owner).map_err(S::Error::custom)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("user".to_string(), owner);
        }
        value.serialize(serializer)
    }
}

/// Paid sales summed over one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailySales {
    #[serde(rename = "_id")]
    pub day: NaiveDate,
    #[serde(rename = "totalSales")]
    pub total_sales: Decimal,
}
