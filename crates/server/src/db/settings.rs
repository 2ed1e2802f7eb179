//! Per-shop settings.
//!
//! One row per shop. A shop that never saved its settings gets
//! [`AppSettings::defaults`], which mirror the column defaults.

use cod_form_core::ShopDomain;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::RepositoryError;

pub const DEFAULT_ORDER_SPAM_WINDOW_MINUTES: i32 = 60;
pub const DEFAULT_IP_ATTEMPT_WINDOW_MINUTES: i32 = 60;
pub const DEFAULT_IP_ATTEMPT_LIMIT: i32 = 5;

/// Checkout form text and colors, as sent to the storefront widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormDesign {
    pub form_title: String,
    pub form_subtitle: String,
    pub button_text: String,
    pub form_bg_color: String,
    pub form_text_color: String,
    pub form_label_color: String,
    pub button_color: String,
    pub button_text_color: String,
}

impl Default for FormDesign {
    fn default() -> Self {
        Self {
            form_title: "Cash on Delivery".to_string(),
            form_subtitle: "Please enter your shipping address".to_string(),
            button_text: "Complete Order".to_string(),
            form_bg_color: "#FFFFFF".to_string(),
            form_text_color: "#000000".to_string(),
            form_label_color: "#333333".to_string(),
            button_color: "#008060".to_string(),
            button_text_color: "#FFFFFF".to_string(),
        }
    }
}

/// Toggles, thresholds, credentials and pixel IDs edited on the settings page.
///
/// Implements `Debug` manually to redact the Twilio auth token.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GeneralSettings {
    pub otp_enabled: bool,
    pub order_spam_protection_enabled: bool,
    pub order_spam_window_minutes: i32,
    pub auto_ip_blocking_enabled: bool,
    pub ip_attempt_window_minutes: i32,
    pub ip_attempt_limit: i32,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_verify_service_sid: Option<String>,
    pub webhook_url: Option<String>,
    pub facebook_pixel_id: Option<String>,
    pub tiktok_pixel_id: Option<String>,
    pub snapchat_pixel_id: Option<String>,
    pub google_analytics_id: Option<String>,
}

impl std::fmt::Debug for GeneralSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralSettings")
            .field("otp_enabled", &self.otp_enabled)
            .field("order_spam_protection_enabled", &self.order_spam_protection_enabled)
            .field("order_spam_window_minutes", &self.order_spam_window_minutes)
            .field("auto_ip_blocking_enabled", &self.auto_ip_blocking_enabled)
            .field("ip_attempt_window_minutes", &self.ip_attempt_window_minutes)
            .field("ip_attempt_limit", &self.ip_attempt_limit)
            .field("twilio_account_sid", &self.twilio_account_sid)
            .field(
                "twilio_auth_token",
                &self.twilio_auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("twilio_verify_service_sid", &self.twilio_verify_service_sid)
            .field("webhook_url", &self.webhook_url)
            .finish_non_exhaustive()
    }
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            otp_enabled: false,
            order_spam_protection_enabled: false,
            order_spam_window_minutes: DEFAULT_ORDER_SPAM_WINDOW_MINUTES,
            auto_ip_blocking_enabled: false,
            ip_attempt_window_minutes: DEFAULT_IP_ATTEMPT_WINDOW_MINUTES,
            ip_attempt_limit: DEFAULT_IP_ATTEMPT_LIMIT,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_verify_service_sid: None,
            webhook_url: None,
            facebook_pixel_id: None,
            tiktok_pixel_id: None,
            snapchat_pixel_id: None,
            google_analytics_id: None,
        }
    }
}

/// Tracking pixel IDs exposed to the storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pixels {
    pub facebook_pixel_id: Option<String>,
    pub tiktok_pixel_id: Option<String>,
    pub snapchat_pixel_id: Option<String>,
    pub google_analytics_id: Option<String>,
}

/// A shop's full settings row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AppSettings {
    pub shop: ShopDomain,
    #[sqlx(flatten)]
    pub general: GeneralSettings,
    #[sqlx(flatten)]
    pub design: FormDesign,
}

impl AppSettings {
    /// Settings used for a shop with no row.
    #[must_use]
    pub fn defaults(shop: ShopDomain) -> Self {
        Self {
            shop,
            general: GeneralSettings::default(),
            design: FormDesign::default(),
        }
    }

    /// Rolling window for the phone spam throttle, falling back on bad values.
    #[must_use]
    pub const fn order_spam_window_minutes(&self) -> i32 {
        positive_or(
            self.general.order_spam_window_minutes,
            DEFAULT_ORDER_SPAM_WINDOW_MINUTES,
        )
    }

    /// Rolling window for IP attempt counting.
    #[must_use]
    pub const fn ip_attempt_window_minutes(&self) -> i32 {
        positive_or(
            self.general.ip_attempt_window_minutes,
            DEFAULT_IP_ATTEMPT_WINDOW_MINUTES,
        )
    }

    /// Attempts allowed within the window before an IP is blocked.
    #[must_use]
    pub const fn ip_attempt_limit(&self) -> i32 {
        positive_or(self.general.ip_attempt_limit, DEFAULT_IP_ATTEMPT_LIMIT)
    }

    /// Configured webhook URL, if any.
    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        non_blank(self.general.webhook_url.as_deref())
    }

    #[must_use]
    pub fn pixels(&self) -> Pixels {
        Pixels {
            facebook_pixel_id: non_blank(self.general.facebook_pixel_id.as_deref()).map(String::from),
            tiktok_pixel_id: non_blank(self.general.tiktok_pixel_id.as_deref()).map(String::from),
            snapchat_pixel_id: non_blank(self.general.snapchat_pixel_id.as_deref()).map(String::from),
            google_analytics_id: non_blank(self.general.google_analytics_id.as_deref())
                .map(String::from),
        }
    }
}

const fn positive_or(value: i32, fallback: i32) -> i32 {
    if value > 0 { value } else { fallback }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

const SELECT_SETTINGS: &str = r"
    SELECT
        shop,
        otp_enabled,
        order_spam_protection_enabled,
        order_spam_window_minutes,
        auto_ip_blocking_enabled,
        ip_attempt_window_minutes,
        ip_attempt_limit,
        twilio_account_sid,
        twilio_auth_token,
        twilio_verify_service_sid,
        webhook_url,
        facebook_pixel_id,
        tiktok_pixel_id,
        snapchat_pixel_id,
        google_analytics_id,
        form_title,
        form_subtitle,
        button_text,
        form_bg_color,
        form_text_color,
        form_label_color,
        button_color,
        button_text_color
    FROM app_settings
    WHERE shop = $1
";

/// Repository for settings operations.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a shop's settings row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, shop: &ShopDomain) -> Result<Option<AppSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, AppSettings>(SELECT_SETTINGS)
            .bind(shop)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Get a shop's settings, or defaults when the shop has no row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_default(&self, shop: &ShopDomain) -> Result<AppSettings, RepositoryError> {
        Ok(self
            .get(shop)
            .await?
            .unwrap_or_else(|| AppSettings::defaults(shop.clone())))
    }

    /// Create or update the settings-page fields, leaving form styling alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_general(
        &self,
        shop: &ShopDomain,
        settings: &GeneralSettings,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO app_settings (
                shop,
                otp_enabled,
                order_spam_protection_enabled,
                order_spam_window_minutes,
                auto_ip_blocking_enabled,
                ip_attempt_window_minutes,
                ip_attempt_limit,
                twilio_account_sid,
                twilio_auth_token,
                twilio_verify_service_sid,
                webhook_url,
                facebook_pixel_id,
                tiktok_pixel_id,
                snapchat_pixel_id,
                google_analytics_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (shop) DO UPDATE SET
                otp_enabled = EXCLUDED.otp_enabled,
                order_spam_protection_enabled = EXCLUDED.order_spam_protection_enabled,
                order_spam_window_minutes = EXCLUDED.order_spam_window_minutes,
                auto_ip_blocking_enabled = EXCLUDED.auto_ip_blocking_enabled,
                ip_attempt_window_minutes = EXCLUDED.ip_attempt_window_minutes,
                ip_attempt_limit = EXCLUDED.ip_attempt_limit,
                twilio_account_sid = EXCLUDED.twilio_account_sid,
                twilio_auth_token = EXCLUDED.twilio_auth_token,
                twilio_verify_service_sid = EXCLUDED.twilio_verify_service_sid,
                webhook_url = EXCLUDED.webhook_url,
                facebook_pixel_id = EXCLUDED.facebook_pixel_id,
                tiktok_pixel_id = EXCLUDED.tiktok_pixel_id,
                snapchat_pixel_id = EXCLUDED.snapchat_pixel_id,
                google_analytics_id = EXCLUDED.google_analytics_id,
                updated_at = NOW()
            ",
        )
        .bind(shop)
        .bind(settings.otp_enabled)
        .bind(settings.order_spam_protection_enabled)
        .bind(settings.order_spam_window_minutes)
        .bind(settings.auto_ip_blocking_enabled)
        .bind(settings.ip_attempt_window_minutes)
        .bind(settings.ip_attempt_limit)
        .bind(&settings.twilio_account_sid)
        .bind(&settings.twilio_auth_token)
        .bind(&settings.twilio_verify_service_sid)
        .bind(&settings.webhook_url)
        .bind(&settings.facebook_pixel_id)
        .bind(&settings.tiktok_pixel_id)
        .bind(&settings.snapchat_pixel_id)
        .bind(&settings.google_analytics_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Create or update the form styling, leaving other settings alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_design(
        &self,
        shop: &ShopDomain,
        design: &FormDesign,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO app_settings (
                shop,
                form_title,
                form_subtitle,
                button_text,
                form_bg_color,
                form_text_color,
                form_label_color,
                button_color,
                button_text_color
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (shop) DO UPDATE SET
                form_title = EXCLUDED.form_title,
                form_subtitle = EXCLUDED.form_subtitle,
                button_text = EXCLUDED.button_text,
                form_bg_color = EXCLUDED.form_bg_color,
                form_text_color = EXCLUDED.form_text_color,
                form_label_color = EXCLUDED.form_label_color,
                button_color = EXCLUDED.button_color,
                button_text_color = EXCLUDED.button_text_color,
                updated_at = NOW()
            ",
        )
        .bind(shop)
        .bind(&design.form_title)
        .bind(&design.form_subtitle)
        .bind(&design.button_text)
        .bind(&design.form_bg_color)
        .bind(&design.form_text_color)
        .bind(&design.form_label_color)
        .bind(&design.button_color)
        .bind(&design.button_text_color)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
