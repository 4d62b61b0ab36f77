use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::OrderError;
use crate::models::{PaymentResult, ShippingAddress};

// ============================================================================
// Inbound schema
// ============================================================================
//
// Bodies are deserialized into these types and validated once, at the HTTP
// edge. Anything the client sends about prices or product details is ignored:
// the catalog is the only source for those.

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "No order items"), nested)]
    pub order_items: Vec<OrderItemRequest>,
    #[validate(nested)]
    pub shipping_address: ShippingAddress,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

// `Serialize` is needed by the `length` rule on the item list
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    #[serde(rename = "_id", alias = "product")]
    pub product: Uuid,
    #[validate(range(min = 1, max = 100000, message = "Quantity must be a positive number"))]
    pub qty: i64,
    #[serde(default)]
    pub image: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self) -> Result<NewOrder, OrderError> {
        self.validate()
            .map_err(|e| OrderError::ValidationFailed(e.to_string()))?;

        let items = self
            .order_items
            .into_iter()
            .map(|item| {
                let quantity = u32::try_from(item.qty).map_err(|_| {
                    OrderError::ValidationFailed("Quantity must be a positive number".into())
                })?;
                Ok(LineRequest {
                    product: item.product,
                    quantity,
                    image: item.image,
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        Ok(NewOrder {
            items,
            shipping_address: self.shipping_address,
            payment_method: self.payment_method,
        })
    }
}

/// A validated creation request, as the lifecycle manager consumes it.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub items: Vec<LineRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

#[derive(Debug, Clone)]
pub struct LineRequest {
    pub product: Uuid,
    pub quantity: u32,
    pub image: Option<String>,
}

/// Payment confirmation body: `{ id, status, update_time, payer: { email_address } }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentResultPayload {
    pub id: Option<String>,
    pub status: Option<String>,
    pub update_time: Option<String>,
    pub payer: Option<Payer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payer {
    pub email_address: Option<String>,
}

impl From<PaymentResultPayload> for PaymentResult {
    fn from(payload: PaymentResultPayload) -> Self {
        PaymentResult {
            id: payload.id,
            status: payload.status,
            update_time: payload.update_time,
            email_address: payload.payer.and_then(|p| p.email_address).map(Into::into),
        }
    }
}
