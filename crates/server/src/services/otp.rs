//! OTP delivery for `POST /proxy/send-otp`.
//!
//! A phone number can request one code per [`OTP_RESEND_SECONDS`]. Codes are
//! generated and checked by Twilio Verify; only the send time is stored.

use async_trait::async_trait;
use axum::http::StatusCode;
use cod_form_core::{PhoneNumber, ShopDomain};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::db::{AbuseLogRepository, GeneralSettings, RepositoryError, SettingsRepository};
use crate::twilio::{Channel, TwilioCredentials, TwilioError, VerificationStatus, VerifyClient};

use super::checkout::PgStore;

/// Minimum gap between two codes for the same phone.
pub const OTP_RESEND_SECONDS: i64 = 60;

/// Body of `POST /proxy/send-otp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpSent {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Phone number required.")]
    MissingPhone,

    #[error("Please wait 60 seconds before requesting another OTP.")]
    TooSoon,

    #[error("OTP verification is not available for this store.")]
    NotConfigured,

    #[error("Could not send OTP. Please try again.")]
    Twilio(#[source] TwilioError),

    #[error("database error: {0}")]
    Internal(#[from] RepositoryError),
}

impl From<TwilioError> for OtpError {
    fn from(e: TwilioError) -> Self {
        match e {
            TwilioError::NotConfigured => Self::NotConfigured,
            other => Self::Twilio(other),
        }
    }
}

impl OtpError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingPhone => StatusCode::BAD_REQUEST,
            Self::TooSoon => StatusCode::TOO_MANY_REQUESTS,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Twilio(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => super::checkout::MSG_INTERNAL.to_string(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Twilio(_) | Self::Internal(_))
    }
}

/// Persistence used when sending codes.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn general_settings(&self, shop: &ShopDomain) -> Result<GeneralSettings, RepositoryError>;

    async fn otp_sent_within(
        &self,
        shop: &ShopDomain,
        phone: &str,
        seconds: i64,
    ) -> Result<bool, RepositoryError>;

    async fn log_otp(&self, shop: &ShopDomain, phone: &str) -> Result<(), RepositoryError>;
}

/// Starts a verification.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn start(
        &self,
        settings: &GeneralSettings,
        phone: &str,
    ) -> Result<VerificationStatus, TwilioError>;
}

/// Send a code to the requested phone.
///
/// # Errors
///
/// Returns [`OtpError`] if the phone is missing, a code was sent within the
/// last minute, Twilio is not configured or fails, or the store fails.
#[instrument(skip(store, sender, request), fields(shop = %shop))]
pub async fn send_otp<S: OtpStore, T: OtpSender>(
    store: &S,
    sender: &T,
    shop: &ShopDomain,
    request: SendOtpRequest,
) -> Result<OtpSent, OtpError> {
    let raw = request
        .phone
        .filter(|p| !p.trim().is_empty())
        .ok_or(OtpError::MissingPhone)?;
    let phone = PhoneNumber::normalize(&raw).map_err(|_| OtpError::MissingPhone)?;

    if store
        .otp_sent_within(shop, phone.as_str(), OTP_RESEND_SECONDS)
        .await?
    {
        return Err(OtpError::TooSoon);
    }

    let settings = store.general_settings(shop).await?;
    let status = sender.start(&settings, phone.as_str()).await.inspect_err(|e| {
        warn!(error = %e, "Failed to start verification");
    })?;

    store.log_otp(shop, phone.as_str()).await?;
    info!(status = ?status, "OTP sent");

    Ok(OtpSent {
        success: true,
        message: "OTP sent.",
    })
}

#[async_trait]
impl OtpStore for PgStore {
    async fn general_settings(&self, shop: &ShopDomain) -> Result<GeneralSettings, RepositoryError> {
        Ok(SettingsRepository::new(&self.pool)
            .get_or_default(shop)
            .await?
            .general)
    }

    async fn otp_sent_within(
        &self,
        shop: &ShopDomain,
        phone: &str,
        seconds: i64,
    ) -> Result<bool, RepositoryError> {
        AbuseLogRepository::new(&self.pool)
            .otp_sent_within(shop, phone, seconds)
            .await
    }

    async fn log_otp(&self, shop: &ShopDomain, phone: &str) -> Result<(), RepositoryError> {
        AbuseLogRepository::new(&self.pool).log_otp(shop, phone).await
    }
}

#[async_trait]
impl OtpSender for VerifyClient {
    async fn start(
        &self,
        settings: &GeneralSettings,
        phone: &str,
    ) -> Result<VerificationStatus, TwilioError> {
        let credentials = TwilioCredentials::from_settings(settings)?;
        self.start_verification(&credentials, phone, Channel::Sms)
            .await
    }
}
