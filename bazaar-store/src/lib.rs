pub mod app_config;
pub mod database;
pub mod order_repo;
pub mod catalog_repo;

pub use database::DbClient;
pub use order_repo::StoreOrderRepository;
pub use catalog_repo::StoreCatalogRepository;
