//! Shipping rate repository.
//!
//! Country and city keep the merchant's spelling. Matching is done on the
//! trimmed, lowercased value, both in SQL and in
//! [`cod_form_core::pricing::resolve_shipping_rate`].

use chrono::{DateTime, Utc};
use cod_form_core::pricing::{RateRule, location_key};
use cod_form_core::{CurrencyCode, Money, ShippingRateId, ShopDomain};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;

/// A configured shipping rate.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShippingRate {
    pub id: ShippingRateId,
    pub country: String,
    pub city: String,
    pub rate: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl ShippingRate {
    /// Convert to the pure pricing type.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored currency is not
    /// a valid ISO code.
    pub fn to_rule(&self) -> Result<RateRule, RepositoryError> {
        let currency = CurrencyCode::parse(&self.currency)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(RateRule {
            country: self.country.clone(),
            city: self.city.clone(),
            rate: Money::new(self.rate, currency),
        })
    }

    #[must_use]
    pub fn is_country_default(&self) -> bool {
        self.city.is_empty()
    }
}

/// Repository for shipping rate operations.
pub struct ShippingRateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All rates for a shop, grouped by country with the default row first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop: &ShopDomain) -> Result<Vec<ShippingRate>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShippingRate>(
            r"
            SELECT id, country, city, rate, currency, updated_at
            FROM shipping_rates
            WHERE shop = $1
            ORDER BY lower(country), city <> '', lower(city)
            ",
        )
        .bind(shop)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Rates for one country: the exact city row and the country default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for a row with a bad currency.
    pub async fn candidates(
        &self,
        shop: &ShopDomain,
        country: &str,
        city: &str,
    ) -> Result<Vec<RateRule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShippingRate>(
            r"
            SELECT id, country, city, rate, currency, updated_at
            FROM shipping_rates
            WHERE shop = $1
              AND lower(trim(country)) = $2
              AND (lower(trim(city)) = $3 OR city = '')
            ",
        )
        .bind(shop)
        .bind(location_key(country))
        .bind(location_key(city))
        .fetch_all(self.pool)
        .await?;

        rows.iter().map(ShippingRate::to_rule).collect()
    }

    /// Create or replace the rate for `(country, city)`.
    ///
    /// An empty `city` sets the country default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        shop: &ShopDomain,
        country: &str,
        city: &str,
        rate: Decimal,
        currency: &CurrencyCode,
    ) -> Result<ShippingRateId, RepositoryError> {
        let id = sqlx::query_scalar::<_, ShippingRateId>(
            r"
            INSERT INTO shipping_rates (shop, country, city, rate, currency)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shop, lower(country), lower(city)) DO UPDATE SET
                country = EXCLUDED.country,
                city = EXCLUDED.city,
                rate = EXCLUDED.rate,
                currency = EXCLUDED.currency,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(shop)
        .bind(country.trim())
        .bind(city.trim())
        .bind(rate)
        .bind(currency.as_str())
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Delete a rate. Returns `false` if it did not exist for this shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &ShopDomain, id: ShippingRateId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_rates WHERE shop = $1 AND id = $2")
            .bind(shop)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of rates configured for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, shop: &ShopDomain) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shipping_rates WHERE shop = $1")
            .bind(shop)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
