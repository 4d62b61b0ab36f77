pub mod models;
pub mod error;
pub mod request;
pub mod repository;
pub mod memory;
pub mod manager;
pub mod confirmation;
pub mod reporting;

pub use models::{DailySales, Order, OrderItem, OrderOwner, OrderWithOwner, PaymentResult, ShippingAddress};
pub use error::OrderError;
pub use request::{CreateOrderRequest, LineRequest, NewOrder, OrderItemRequest, PaymentResultPayload};
pub use repository::{OrderRepository, RepoResult};
pub use memory::InMemoryOrderRepository;
pub use manager::OrderManager;
pub use confirmation::ConfirmationMailer;
pub use reporting::SalesReporter;
