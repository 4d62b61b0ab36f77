use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authoritative catalog record, as far as order pricing is concerned.
/// Owned by the product service; orders only ever read it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    #[serde(rename = "serialnumber", alias = "serialNumber")]
    pub serial_number: String,
    #[serde(default)]
    pub brand: Option<String>,
}

impl CatalogEntry {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        price: Decimal,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            serial_number: serial_number.into(),
            brand: None,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}
