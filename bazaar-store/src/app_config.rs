use std::env;
use std::str::FromStr;
use std::time::Duration;

use bazaar_catalog::CatalogEntry;
use bazaar_core::DispatchPolicy;
use bazaar_order::OrderOwner;
use chrono::FixedOffset;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub reporting: ReportingConfig,
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// No url means the in-memory stores are used.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_cookie_name() -> String { "jwt".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct ReportingConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl ReportingConfig {
    /// `None` when the configured offset is outside ±24h.
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Extra recipient for every order confirmation
    pub sales_inbox: Option<String>,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl NotificationConfig {
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            queue_capacity: self.queue_capacity,
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            ..DispatchPolicy::default()
        }
    }
}

/// Products and users loaded into the in-memory stores when no database is
/// configured. Ignored otherwise.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedProduct {
    pub id: Uuid,
    pub name: String,
    /// Decimal string, e.g. "19.99"
    pub price: String,
    pub serialnumber: String,
    pub brand: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl SeedConfig {
    pub fn catalog_entries(&self) -> Result<Vec<CatalogEntry>, rust_decimal::Error> {
        self.products
            .iter()
            .map(|p| {
                let entry = CatalogEntry::new(
                    p.id,
                    p.name.clone(),
                    Decimal::from_str(&p.price)?,
                    p.serialnumber.clone(),
                );
                Ok(match &p.brand {
                    Some(brand) => entry.with_brand(brand.clone()),
                    None => entry,
                })
            })
            .collect()
    }

    pub fn owners(&self) -> Vec<OrderOwner> {
        self.users
            .iter()
            .map(|u| OrderOwner {
                id: u.id,
                username: u.username.clone(),
                email: u.email.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.users.is_empty()
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `BAZAAR__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("BAZAAR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
