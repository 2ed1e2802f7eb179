//! Database operations for COD Form `PostgreSQL`.
//!
//! ## Tables
//!
//! - `shop_sessions` - Offline Admin API token per installed shop
//! - `app_settings` - Feature toggles, thresholds, credentials and form styling
//! - `shipping_rates` - Per-country and per-city shipping rates
//! - `quantity_offers` - Per-product quantity discount tiers
//! - `form_fields` - Merchant-defined checkout form fields
//! - `blocked_ips` - IP block list
//! - `ip_order_logs`, `order_logs`, `otp_logs` - Append-only throttle logs
//! - `tower_sessions.session` - Merchant browser sessions
//!
//! Every table is keyed by the shop's `*.myshopify.com` domain.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p cod-form-cli -- migrate
//! ```

pub mod abuse;
pub mod form_fields;
pub mod quantity_offers;
pub mod settings;
pub mod shipping_rates;
pub mod shop_sessions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use abuse::{
    AbuseLogRepository, AttemptOutcome, BlockedIp, BlockedIpPage, BlockedIpRepository, PruneCounts,
};
pub use form_fields::{FormField, FormFieldInput, FormFieldRepository};
pub use quantity_offers::{QuantityOffer, QuantityOfferInput, QuantityOfferRepository};
pub use settings::{AppSettings, FormDesign, GeneralSettings, Pixels, SettingsRepository};
pub use shipping_rates::{ShippingRate, ShippingRateRepository};
pub use shop_sessions::{ShopSession, ShopSessionRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
