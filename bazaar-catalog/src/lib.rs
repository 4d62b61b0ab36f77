pub mod product;
pub mod pricing;
pub mod lookup;

pub use product::CatalogEntry;
pub use pricing::{OrderTotals, PriceLine, PricingConfig, PricingEngine, PricingError};
pub use lookup::{CatalogLookup, InMemoryCatalog};
