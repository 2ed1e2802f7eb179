//! Dashboard with configuration counts and links.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::db::{
    BlockedIpRepository, FormFieldRepository, QuantityOfferRepository, SettingsRepository,
    ShippingRateRepository,
};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub rate_count: i64,
    pub offer_count: i64,
    pub field_count: usize,
    pub blocked_count: i64,
    pub otp_enabled: bool,
    pub spam_protection_enabled: bool,
    pub auto_ip_blocking_enabled: bool,
    pub webhook_configured: bool,
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool();
    let shop = &current.shop;

    let settings = SettingsRepository::new(pool).get_or_default(shop).await?;
    let rate_count = ShippingRateRepository::new(pool).count(shop).await?;
    let offer_count = QuantityOfferRepository::new(pool).count(shop).await?;
    let field_count = FormFieldRepository::new(pool).list(shop).await?.len();
    let blocked_count = BlockedIpRepository::new(pool).page(shop, 1, 1).await?.total;

    Ok(DashboardTemplate {
        shop: shop.to_string(),
        current_path: "/app",
        rate_count,
        offer_count,
        field_count,
        blocked_count,
        otp_enabled: settings.general.otp_enabled,
        spam_protection_enabled: settings.general.order_spam_protection_enabled,
        auto_ip_blocking_enabled: settings.general.auto_ip_blocking_enabled,
        webhook_configured: settings.webhook_url().is_some(),
    })
}
