//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::{GeoIpService, WebhookClient};
use crate::shopify::{AdminClient, AdminShopifyError};
use crate::twilio::{TwilioError, VerifyClient};

/// Error building the outbound clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Shopify client: {0}")]
    Shopify(#[from] AdminShopifyError),
    #[error("Twilio client: {0}")]
    Twilio(#[from] TwilioError),
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    shopify: AdminClient,
    verify: VerifyClient,
    webhooks: WebhookClient,
    geoip: GeoIpService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound HTTP client cannot be built.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, StateError> {
        let shopify = AdminClient::new(&config.shopify, config.http_timeout)?;
        let verify = VerifyClient::new(config.http_timeout)?;
        let webhooks = WebhookClient::new()?;
        let geoip = GeoIpService::new(&config.geoip, config.http_timeout)?;

        Ok(Self::from_parts(config, pool, shopify, verify, webhooks, geoip))
    }

    /// Assemble state from prebuilt clients.
    #[must_use]
    pub fn from_parts(
        config: AppConfig,
        pool: PgPool,
        shopify: AdminClient,
        verify: VerifyClient,
        webhooks: WebhookClient,
        geoip: GeoIpService,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shopify,
                verify,
                webhooks,
                geoip,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Shopify Admin API client (OAuth and GraphQL).
    #[must_use]
    pub fn shopify(&self) -> &AdminClient {
        &self.inner.shopify
    }

    /// Twilio Verify client.
    #[must_use]
    pub fn verify(&self) -> &VerifyClient {
        &self.inner.verify
    }

    #[must_use]
    pub fn webhooks(&self) -> &WebhookClient {
        &self.inner.webhooks
    }

    #[must_use]
    pub fn geoip(&self) -> &GeoIpService {
        &self.inner.geoip
    }
}

/// State over a lazy pool for handler tests that never reach the database.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_state() -> AppState {
    let config = crate::config::test_config();
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/cod_form_test")
        .unwrap();
    AppState::new(config, pool).unwrap()
}
