//! Quantity offer repository.

use cod_form_core::pricing::QuantityTier;
use cod_form_core::{DiscountType, QuantityOfferId, ShopDomain};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

/// A stored quantity discount tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuantityOffer {
    pub id: QuantityOfferId,
    pub product_id: String,
    pub min_quantity: i32,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

impl QuantityOffer {
    /// Convert to the pure pricing type.
    #[must_use]
    pub fn to_tier(&self) -> QuantityTier {
        QuantityTier {
            product_id: self.product_id.clone(),
            min_quantity: u32::try_from(self.min_quantity).unwrap_or(0),
            discount_type: self.discount_type,
            discount_value: self.discount_value,
        }
    }
}

/// Fields accepted by the offers page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityOfferInput {
    pub product_id: String,
    pub min_quantity: i32,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

/// Repository for quantity offer operations.
pub struct QuantityOfferRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuantityOfferRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All offers for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop: &ShopDomain) -> Result<Vec<QuantityOffer>, RepositoryError> {
        let rows = sqlx::query_as::<_, QuantityOffer>(
            r"
            SELECT id, product_id, min_quantity, discount_type, discount_value
            FROM quantity_offers
            WHERE shop = $1
            ORDER BY product_id, min_quantity
            ",
        )
        .bind(shop)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Offers for any of the given products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_products(
        &self,
        shop: &ShopDomain,
        product_ids: &[String],
    ) -> Result<Vec<QuantityOffer>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, QuantityOffer>(
            r"
            SELECT id, product_id, min_quantity, discount_type, discount_value
            FROM quantity_offers
            WHERE shop = $1 AND product_id = ANY($2)
            ORDER BY product_id, min_quantity
            ",
        )
        .bind(shop)
        .bind(product_ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create or replace the tier for `(product, min_quantity)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        shop: &ShopDomain,
        input: &QuantityOfferInput,
    ) -> Result<QuantityOfferId, RepositoryError> {
        let id = sqlx::query_scalar::<_, QuantityOfferId>(
            r"
            INSERT INTO quantity_offers (shop, product_id, min_quantity, discount_type, discount_value)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shop, product_id, min_quantity) DO UPDATE SET
                discount_type = EXCLUDED.discount_type,
                discount_value = EXCLUDED.discount_value
            RETURNING id
            ",
        )
        .bind(shop)
        .bind(input.product_id.trim())
        .bind(input.min_quantity)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Delete an offer. Returns `false` if it did not exist for this shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(
        &self,
        shop: &ShopDomain,
        id: QuantityOfferId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM quantity_offers WHERE shop = $1 AND id = $2")
            .bind(shop)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of offers configured for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, shop: &ShopDomain) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quantity_offers WHERE shop = $1")
                .bind(shop)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
