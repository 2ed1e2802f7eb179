//! Settings page: OTP, fraud protection, Twilio, webhook and pixels.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use super::{NoticeQuery, checkbox, parse_i32, redirect_error, redirect_success, text};
use crate::db::{GeneralSettings, SettingsRepository};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

const PATH: &str = "/app/settings";

#[derive(Template, WebTemplate)]
#[template(path = "admin/settings.html")]
pub struct SettingsTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub notice: NoticeQuery,
    pub settings: GeneralSettings,
    pub has_auth_token: bool,
}

/// Settings form. Checkboxes are absent when unticked.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub otp_enabled: Option<String>,
    pub order_spam_protection_enabled: Option<String>,
    pub order_spam_window_minutes: Option<String>,
    pub auto_ip_blocking_enabled: Option<String>,
    pub ip_attempt_window_minutes: Option<String>,
    pub ip_attempt_limit: Option<String>,
    pub twilio_account_sid: Option<String>,
    /// Left blank to keep the stored token.
    pub twilio_auth_token: Option<String>,
    pub twilio_verify_service_sid: Option<String>,
    pub webhook_url: Option<String>,
    pub facebook_pixel_id: Option<String>,
    pub tiktok_pixel_id: Option<String>,
    pub snapchat_pixel_id: Option<String>,
    pub google_analytics_id: Option<String>,
}

impl SettingsForm {
    /// Merge the form into the stored settings.
    fn apply(self, current: &GeneralSettings) -> Result<GeneralSettings, &'static str> {
        let positive = |value: Option<&str>, fallback: i32, message: &'static str| match text(value) {
            None => Ok(fallback),
            Some(_) => parse_i32(value).filter(|v| *v > 0).ok_or(message),
        };

        let webhook_url = text(self.webhook_url.as_deref());
        if let Some(url) = &webhook_url {
            let valid = url::Url::parse(url)
                .is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
            if !valid {
                return Err("Webhook URL must be an http(s) URL.");
            }
        }

        Ok(GeneralSettings {
            otp_enabled: checkbox(self.otp_enabled.as_deref()),
            order_spam_protection_enabled: checkbox(self.order_spam_protection_enabled.as_deref()),
            order_spam_window_minutes: positive(
                self.order_spam_window_minutes.as_deref(),
                current.order_spam_window_minutes,
                "Spam window must be a positive number of minutes.",
            )?,
            auto_ip_blocking_enabled: checkbox(self.auto_ip_blocking_enabled.as_deref()),
            ip_attempt_window_minutes: positive(
                self.ip_attempt_window_minutes.as_deref(),
                current.ip_attempt_window_minutes,
                "IP window must be a positive number of minutes.",
            )?,
            ip_attempt_limit: positive(
                self.ip_attempt_limit.as_deref(),
                current.ip_attempt_limit,
                "IP attempt limit must be a positive number.",
            )?,
            twilio_account_sid: text(self.twilio_account_sid.as_deref()),
            twilio_auth_token: text(self.twilio_auth_token.as_deref())
                .or_else(|| current.twilio_auth_token.clone()),
            twilio_verify_service_sid: text(self.twilio_verify_service_sid.as_deref()),
            webhook_url,
            facebook_pixel_id: text(self.facebook_pixel_id.as_deref()),
            tiktok_pixel_id: text(self.tiktok_pixel_id.as_deref()),
            snapchat_pixel_id: text(self.snapchat_pixel_id.as_deref()),
            google_analytics_id: text(self.google_analytics_id.as_deref()),
        })
    }
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let settings = SettingsRepository::new(state.pool())
        .get_or_default(&current.shop)
        .await?
        .general;

    Ok(SettingsTemplate {
        shop: current.shop.to_string(),
        current_path: PATH,
        notice,
        has_auth_token: settings.twilio_auth_token.is_some(),
        settings,
    })
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn update(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Result<Redirect, AppError> {
    let repo = SettingsRepository::new(state.pool());
    let stored = repo.get_or_default(&current.shop).await?.general;

    let updated = match form.apply(&stored) {
        Ok(updated) => updated,
        Err(message) => return Ok(redirect_error(PATH, message)),
    };

    repo.save_general(&current.shop, &updated).await?;
    tracing::info!(
        otp_enabled = updated.otp_enabled,
        spam_protection = updated.order_spam_protection_enabled,
        auto_ip_blocking = updated.auto_ip_blocking_enabled,
        "Settings saved"
    );
    Ok(redirect_success(PATH, "Settings saved."))
}
