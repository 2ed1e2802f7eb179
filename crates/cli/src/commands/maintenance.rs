//! Maintenance commands: throttle log pruning and IP unblocking.

use cod_form_core::ShopDomain;
use cod_form_server::db::{AbuseLogRepository, BlockedIpRepository, RepositoryError};
use thiserror::Error;

use super::migrate::{MigrationError, connect};

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("{0}")]
    Connect(#[from] MigrationError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Delete `ip_order_logs`, `order_logs` and `otp_logs` rows older than `days`.
pub async fn prune(days: i64) -> Result<(), MaintenanceError> {
    if days < 1 {
        return Err(MaintenanceError::InvalidArgument(
            "--days must be at least 1".to_string(),
        ));
    }

    let pool = connect().await?;
    let counts = AbuseLogRepository::new(&pool).prune(days).await?;

    tracing::info!(
        days,
        ip_order_logs = counts.ip_order_logs,
        order_logs = counts.order_logs,
        otp_logs = counts.otp_logs,
        "Pruned throttle logs"
    );
    Ok(())
}

/// Remove `ip` from `shop`'s block list.
pub async fn unblock_ip(shop: &str, ip: &str) -> Result<(), MaintenanceError> {
    let shop = ShopDomain::parse(shop)
        .map_err(|e| MaintenanceError::InvalidArgument(format!("shop: {e}")))?;

    let pool = connect().await?;
    if BlockedIpRepository::new(&pool).delete_by_ip(&shop, ip).await? {
        tracing::info!(shop = %shop, ip, "IP unblocked");
    } else {
        tracing::warn!(shop = %shop, ip, "IP was not blocked");
    }
    Ok(())
}
