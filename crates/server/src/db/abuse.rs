//! IP block list and the throttle logs behind it.
//!
//! `ip_order_logs` feeds auto-blocking, `order_logs` feeds the per-phone spam
//! throttle and `otp_logs` feeds the OTP resend cooldown. All three are
//! append-only and pruned by `cod-cli prune`.

use chrono::{DateTime, Duration, Utc};
use cod_form_core::{BlockedIpId, ShopDomain};
use sqlx::PgPool;

use super::RepositoryError;

/// A block-list entry.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BlockedIp {
    pub id: BlockedIpId,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

/// One page of the block list, newest first.
#[derive(Debug, Clone)]
pub struct BlockedIpPage {
    pub items: Vec<BlockedIp>,
    pub page: i64,
    pub total: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Result of recording an order attempt from an IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Still within the limit.
    Allowed { attempts: i64 },
    /// Over the limit; the IP is now on the block list.
    Blocked { attempts: i64 },
}

impl AttemptOutcome {
    /// Classify the `attempts`-th attempt in the window against `limit`.
    ///
    /// Attempts `1..=limit` are allowed; attempt `limit + 1` and later block.
    #[must_use]
    pub fn classify(attempts: i64, limit: i32) -> Self {
        if attempts > i64::from(limit) {
            Self::Blocked { attempts }
        } else {
            Self::Allowed { attempts }
        }
    }

    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Rows removed by [`AbuseLogRepository::prune`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub ip_order_logs: u64,
    pub order_logs: u64,
    pub otp_logs: u64,
}

/// Repository for the block list.
pub struct BlockedIpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BlockedIpRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether `ip` is blocked for this shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_blocked(&self, shop: &ShopDomain, ip: &str) -> Result<bool, RepositoryError> {
        let blocked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM blocked_ips WHERE shop = $1 AND ip_address = $2)",
        )
        .bind(shop)
        .bind(ip)
        .fetch_one(self.pool)
        .await?;

        Ok(blocked)
    }

    /// One page of the block list. `page` starts at 1.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn page(
        &self,
        shop: &ShopDomain,
        page: i64,
        page_size: i64,
    ) -> Result<BlockedIpPage, RepositoryError> {
        let page = page.max(1);
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blocked_ips WHERE shop = $1")
            .bind(shop)
            .fetch_one(self.pool)
            .await?;

        let items = sqlx::query_as::<_, BlockedIp>(
            r"
            SELECT id, ip_address, created_at
            FROM blocked_ips
            WHERE shop = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(shop)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(self.pool)
        .await?;

        Ok(BlockedIpPage {
            items,
            page,
            total,
            has_previous: page > 1,
            has_next: page * page_size < total,
        })
    }

    /// Add an IP to the block list. Adding an existing entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(&self, shop: &ShopDomain, ip: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO blocked_ips (shop, ip_address)
            VALUES ($1, $2)
            ON CONFLICT (shop, ip_address) DO NOTHING
            ",
        )
        .bind(shop)
        .bind(ip.trim())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove an entry by id. Returns `false` if it did not exist for this shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &ShopDomain, id: BlockedIpId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM blocked_ips WHERE shop = $1 AND id = $2")
            .bind(shop)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an entry by address. Returns `false` if it was not blocked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_ip(&self, shop: &ShopDomain, ip: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM blocked_ips WHERE shop = $1 AND ip_address = $2")
            .bind(shop)
            .bind(ip.trim())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for the append-only throttle logs.
pub struct AbuseLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AbuseLogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an order attempt from `ip` and block the IP once it has made
    /// more than `limit` attempts within `window_minutes`.
    ///
    /// Runs in one transaction holding a transaction-scoped advisory lock on
    /// `(shop, ip)`, so concurrent attempts from the same address are counted
    /// one after another and exactly one of them crosses the limit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; the
    /// transaction is rolled back.
    pub async fn record_ip_attempt(
        &self,
        shop: &ShopDomain,
        ip: &str,
        window_minutes: i32,
        limit: i32,
    ) -> Result<AttemptOutcome, RepositoryError> {
        let cutoff = Utc::now() - Duration::minutes(i64::from(window_minutes));
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || '|' || $2, 0))")
            .bind(shop)
            .bind(ip)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO ip_order_logs (shop, ip_address) VALUES ($1, $2)")
            .bind(shop)
            .bind(ip)
            .execute(&mut *tx)
            .await?;

        let attempts = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM ip_order_logs
            WHERE shop = $1 AND ip_address = $2 AND created_at > $3
            ",
        )
        .bind(shop)
        .bind(ip)
        .bind(cutoff)
        .fetch_one(&mut *tx)
        .await?;

        let outcome = AttemptOutcome::classify(attempts, limit);
        if outcome.is_blocked() {
            sqlx::query(
                r"
                INSERT INTO blocked_ips (shop, ip_address)
                VALUES ($1, $2)
                ON CONFLICT (shop, ip_address) DO NOTHING
                ",
            )
            .bind(shop)
            .bind(ip)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Whether an order was placed for `phone` within `window_minutes`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_order_exists(
        &self,
        shop: &ShopDomain,
        phone: &str,
        window_minutes: i32,
    ) -> Result<bool, RepositoryError> {
        let cutoff = Utc::now() - Duration::minutes(i64::from(window_minutes));
        let exists = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM order_logs
                WHERE shop = $1 AND phone = $2 AND created_at > $3
            )
            ",
        )
        .bind(shop)
        .bind(phone)
        .bind(cutoff)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Append an order-log row for `phone`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn log_order(&self, shop: &ShopDomain, phone: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO order_logs (shop, phone) VALUES ($1, $2)")
            .bind(shop)
            .bind(phone)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Whether an OTP was sent to `phone` within the last `seconds`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn otp_sent_within(
        &self,
        shop: &ShopDomain,
        phone: &str,
        seconds: i64,
    ) -> Result<bool, RepositoryError> {
        let cutoff = Utc::now() - Duration::seconds(seconds);
        let exists = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM otp_logs
                WHERE shop = $1 AND phone = $2 AND created_at > $3
            )
            ",
        )
        .bind(shop)
        .bind(phone)
        .bind(cutoff)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Append an OTP-log row for `phone`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn log_otp(&self, shop: &ShopDomain, phone: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO otp_logs (shop, phone) VALUES ($1, $2)")
            .bind(shop)
            .bind(phone)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete log rows older than `days` across all shops.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any delete fails.
    pub async fn prune(&self, days: i64) -> Result<PruneCounts, RepositoryError> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut counts = PruneCounts::default();

        for (table, slot) in [
            ("ip_order_logs", &mut counts.ip_order_logs),
            ("order_logs", &mut counts.order_logs),
            ("otp_logs", &mut counts.otp_logs),
        ] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE created_at < $1"))
                .bind(cutoff)
                .execute(self.pool)
                .await?;
            *slot = result.rows_affected();
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_starts_one_past_the_limit() {
        for attempts in 1..=5 {
            assert_eq!(
                AttemptOutcome::classify(attempts, 5),
                AttemptOutcome::Allowed { attempts }
            );
        }
        assert_eq!(
            AttemptOutcome::classify(6, 5),
            AttemptOutcome::Blocked { attempts: 6 }
        );
        assert!(AttemptOutcome::classify(7, 5).is_blocked());
    }

    #[test]
    fn test_zero_limit_blocks_first_attempt() {
        assert!(AttemptOutcome::classify(1, 0).is_blocked());
    }
}
