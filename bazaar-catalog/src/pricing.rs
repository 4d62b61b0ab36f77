use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// One priced line: the resolved catalog unit price and the ordered quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLine {
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl PriceLine {
    pub fn new(unit_price: Decimal, quantity: u32) -> Self {
        Self { unit_price, quantity }
    }

    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Order total exceeds the supported amount")]
    Overflow,
}

/// Totals stamped onto an order at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub items_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Decimal places money amounts are rounded to
    pub scale: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { scale: 2 }
    }
}

/// Derives order totals from trusted unit prices.
///
/// Tax, shipping and discounts are not part of the total: `total_price` is
/// always equal to `items_price`.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Sum of `unit_price × quantity`, rounded half-up once at the end.
    pub fn order_totals<I>(&self, lines: I) -> Result<OrderTotals, PricingError>
    where
        I: IntoIterator<Item = PriceLine>,
    {
        let raw = lines.into_iter().try_fold(Decimal::ZERO, |acc, line| {
            line.line_total()
                .and_then(|total| acc.checked_add(total))
                .ok_or(PricingError::Overflow)
        })?;
        let items_price = self.round(raw);

        Ok(OrderTotals {
            items_price,
            total_price: items_price,
        })
    }

    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.config.scale, RoundingStrategy::MidpointAwayFromZero)
    }
}
