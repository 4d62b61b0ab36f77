use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bazaar_catalog::{CatalogLookup, InMemoryCatalog, PricingEngine};
use bazaar_core::{DispatchStats, LogNotifier, NotificationDispatcher};
use bazaar_order::{
    ConfirmationMailer, InMemoryOrderRepository, OrderManager, OrderRepository, SalesReporter,
};
use bazaar_store::app_config::Config;
use bazaar_store::{DbClient, StoreCatalogRepository, StoreOrderRepository};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::state::{AppState, AuthConfig};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the service owns for its lifetime. Built once at startup and
/// torn down explicitly after the server stops.
pub struct AppContext {
    pub state: AppState,
    db: Option<DbClient>,
    notifications: JoinHandle<DispatchStats>,
}

impl AppContext {
    pub async fn init(config: &Config) -> anyhow::Result<Self> {
        let offset = config
            .reporting
            .offset()
            .context("reporting.utc_offset_minutes is out of range")?;

        let orders: Arc<dyn OrderRepository>;
        let catalog: Arc<dyn CatalogLookup>;
        let mut db = None;

        match &config.database.url {
            Some(url) => {
                let client = DbClient::new(url, config.database.max_connections)
                    .await
                    .context("Failed to connect to Postgres")?;
                client.migrate().await.context("Failed to run migrations")?;

                orders = Arc::new(StoreOrderRepository::new(client.pool.clone()));
                catalog = Arc::new(StoreCatalogRepository::new(client.pool.clone()));
                db = Some(client);

                if !config.seed.is_empty() {
                    warn!("Ignoring [seed] section, a database is configured");
                }
            }
            None => {
                let entries = config
                    .seed
                    .catalog_entries()
                    .context("Invalid price in [seed.products]")?;
                let owners = config.seed.owners();

                warn!(
                    products = entries.len(),
                    users = owners.len(),
                    "No database url configured, orders are kept in memory"
                );
                if entries.is_empty() {
                    warn!("In-memory catalog is empty, every order will fail with 404 until [seed.products] is set");
                }

                let repo = InMemoryOrderRepository::new();
                for owner in owners {
                    repo.register_owner(owner).await;
                }
                orders = Arc::new(repo);
                catalog = Arc::new(InMemoryCatalog::with_entries(entries));
            }
        }

        let (queue, notifications) =
            NotificationDispatcher::spawn(Arc::new(LogNotifier), config.notifications.policy());
        let mailer =
            ConfirmationMailer::new(queue, config.notifications.sales_inbox.clone(), offset);

        let manager = OrderManager::new(orders.clone(), catalog, PricingEngine::default())
            .with_confirmations(mailer);

        let state = AppState {
            orders: Arc::new(manager),
            reports: Arc::new(SalesReporter::new(orders, offset)),
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                cookie_name: config.auth.cookie_name.clone(),
            },
        };

        info!(persistent = db.is_some(), "Application context ready");
        Ok(Self { state, db, notifications })
    }

    /// Closes the notification queue, waits for pending confirmations and
    /// releases the connection pool. Every `AppState` clone handed to the
    /// router must be dropped first or the drain will time out.
    pub async fn shutdown(self) {
        let Self { state, db, notifications } = self;
        drop(state);

        match tokio::time::timeout(DRAIN_TIMEOUT, notifications).await {
            Ok(Ok(stats)) => info!(
                delivered = stats.delivered,
                dropped = stats.dropped,
                "Notification queue drained"
            ),
            Ok(Err(e)) => error!(error = %e, "Notification worker failed"),
            Err(_) => warn!("Notification queue did not drain in time"),
        }

        if let Some(db) = db {
            db.close().await;
        }
    }
}
