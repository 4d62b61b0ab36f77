use std::sync::Arc;

use bazaar_order::{OrderManager, SalesReporter};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub cookie_name: String,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderManager>,
    pub reports: Arc<SalesReporter>,
    pub auth: AuthConfig,
}
