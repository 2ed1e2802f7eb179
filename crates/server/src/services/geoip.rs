//! Country lookup by client IP.
//!
//! Answers are cached for an hour. Any failure (network, non-success status,
//! missing field) yields the configured default country and is not cached.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::GeoIpConfig;

#[derive(Debug, Deserialize)]
struct LookupResponse {
    country: Option<String>,
}

/// Cached geo-IP client.
#[derive(Clone)]
pub struct GeoIpService {
    inner: Arc<GeoIpInner>,
}

struct GeoIpInner {
    client: reqwest::Client,
    base_url: String,
    default_country: String,
    cache: Cache<String, String>,
}

impl GeoIpService {
    /// Create the service.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: &GeoIpConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600)) // 1 hour
            .build();

        Ok(Self {
            inner: Arc::new(GeoIpInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                default_country: config.default_country.clone(),
                cache,
            }),
        })
    }

    /// Country name for `ip`, or the default country.
    #[instrument(skip(self))]
    pub async fn country_for(&self, ip: &str) -> String {
        if let Some(country) = self.inner.cache.get(ip).await {
            return country;
        }

        match self.lookup(ip).await {
            Ok(Some(country)) => {
                self.inner
                    .cache
                    .insert(ip.to_string(), country.clone())
                    .await;
                country
            }
            Ok(None) => {
                debug!("Geo-IP lookup returned no country");
                self.inner.default_country.clone()
            }
            Err(e) => {
                warn!(error = %e, "Geo-IP lookup failed");
                self.inner.default_country.clone()
            }
        }
    }

    async fn lookup(&self, ip: &str) -> Result<Option<String>, reqwest::Error> {
        let url = format!(
            "{}/{}?fields=country",
            self.inner.base_url,
            urlencoding::encode(ip)
        );

        let body: LookupResponse = self
            .inner
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.country.filter(|c| !c.trim().is_empty()))
    }
}
