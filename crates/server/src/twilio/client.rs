//! Twilio Verify HTTP client.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::error::TwilioError;
use crate::db::GeneralSettings;

/// Twilio Verify API base URL.
const TWILIO_VERIFY_BASE: &str = "https://verify.twilio.com/v2";

/// A shop's Twilio account and Verify service.
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub service_sid: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("service_sid", &self.service_sid)
            .finish()
    }
}

impl TwilioCredentials {
    /// Read credentials from a shop's settings.
    ///
    /// # Errors
    ///
    /// Returns `TwilioError::NotConfigured` if any of the three values is
    /// missing or blank.
    pub fn from_settings(settings: &GeneralSettings) -> Result<Self, TwilioError> {
        let pick = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or(TwilioError::NotConfigured)
        };

        Ok(Self {
            account_sid: pick(&settings.twilio_account_sid)?,
            auth_token: SecretString::from(pick(&settings.twilio_auth_token)?),
            service_sid: pick(&settings.twilio_verify_service_sid)?,
        })
    }
}

/// Delivery channel for a verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Sms,
    Call,
    Whatsapp,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Call => "call",
            Self::Whatsapp => "whatsapp",
        }
    }
}

/// Status of a verification as reported by Twilio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Approved,
    Canceled,
    Other(String),
}

impl VerificationStatus {
    fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "canceled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
}

/// Twilio Verify client shared by all shops.
#[derive(Debug, Clone)]
pub struct VerifyClient {
    client: Client,
    base_url: String,
}

impl VerifyClient {
    /// Create a client against the public Twilio endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TwilioError::Http` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TwilioError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self::with_base_url(client, TWILIO_VERIFY_BASE))
    }

    /// Create a client against another base URL.
    #[must_use]
    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a verification code to `to`.
    ///
    /// # Errors
    ///
    /// Returns `TwilioError::Api` if Twilio rejects the request, or
    /// `TwilioError::Http` on transport failure.
    #[instrument(skip(self, credentials), fields(service = %credentials.service_sid, channel = channel.as_str()))]
    pub async fn start_verification(
        &self,
        credentials: &TwilioCredentials,
        to: &str,
        channel: Channel,
    ) -> Result<VerificationStatus, TwilioError> {
        let status = self
            .post(
                credentials,
                "Verifications",
                &[("To", to), ("Channel", channel.as_str())],
            )
            .await?;

        debug!(status = ?status, "Verification started");
        Ok(status)
    }

    /// Check a code the customer entered for `to`.
    ///
    /// # Errors
    ///
    /// Returns `TwilioError::Api` if Twilio rejects the request (including an
    /// expired or unknown verification), or `TwilioError::Http` on transport
    /// failure.
    #[instrument(skip(self, credentials, code), fields(service = %credentials.service_sid))]
    pub async fn check_verification(
        &self,
        credentials: &TwilioCredentials,
        to: &str,
        code: &str,
    ) -> Result<VerificationStatus, TwilioError> {
        let status = self
            .post(
                credentials,
                "VerificationCheck",
                &[("To", to), ("Code", code)],
            )
            .await?;

        debug!(status = ?status, "Verification checked");
        Ok(status)
    }

    async fn post(
        &self,
        credentials: &TwilioCredentials,
        resource: &str,
        form: &[(&str, &str)],
    ) -> Result<VerificationStatus, TwilioError> {
        let url = format!(
            "{}/Services/{}/{resource}",
            self.base_url, credentials.service_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &credentials.account_sid,
                Some(credentials.auth_token.expose_secret()),
            )
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), message = %message, "Twilio API error");
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: VerificationResponse = response.json().await?;
        Ok(VerificationStatus::parse(&body.status))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use std::collections::HashMap;

    fn credentials() -> TwilioCredentials {
        TwilioCredentials {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("token"),
            service_sid: "VA456".to_string(),
        }
    }

    async fn verify(
        Path((service, resource)): Path<(String, String)>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        // "AC123:token" in base64
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Basic QUMxMjM6dG9rZW4=");
        if !authorized || service != "VA456" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"code": 20003, "message": "Authenticate", "status": 401})),
            );
        }

        match (resource.as_str(), form.get("Code").map(String::as_str)) {
            ("Verifications", _) => (
                StatusCode::CREATED,
                Json(serde_json::json!({"status": "pending", "to": form["To"]})),
            ),
            ("VerificationCheck", Some("123456")) => (
                StatusCode::OK,
                Json(serde_json::json!({"status": "approved"})),
            ),
            ("VerificationCheck", Some(_)) => (
                StatusCode::OK,
                Json(serde_json::json!({"status": "pending"})),
            ),
            _ => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"code": 20404, "message": "not found", "status": 404})),
            ),
        }
    }

    async fn spawn_fake() -> VerifyClient {
        let app = Router::new().route("/v2/Services/{service}/{resource}", post(verify));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        VerifyClient::with_base_url(Client::new(), &format!("http://{addr}/v2"))
    }

    #[tokio::test]
    async fn test_start_and_check() {
        let client = spawn_fake().await;
        let creds = credentials();

        let started = client
            .start_verification(&creds, "+923001234567", Channel::Sms)
            .await
            .unwrap();
        assert_eq!(started, VerificationStatus::Pending);

        let ok = client
            .check_verification(&creds, "+923001234567", "123456")
            .await
            .unwrap();
        assert!(ok.is_approved());

        let wrong = client
            .check_verification(&creds, "+923001234567", "000000")
            .await
            .unwrap();
        assert!(!wrong.is_approved());
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let client = spawn_fake().await;
        let mut creds = credentials();
        creds.auth_token = SecretString::from("wrong");

        let err = client
            .start_verification(&creds, "+923001234567", Channel::Sms)
            .await
            .unwrap_err();

        match err {
            TwilioError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Authenticate");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_credentials_require_all_values() {
        let mut settings = GeneralSettings {
            twilio_account_sid: Some("AC123".to_string()),
            twilio_auth_token: Some("token".to_string()),
            twilio_verify_service_sid: Some("  ".to_string()),
            ..GeneralSettings::default()
        };
        assert!(matches!(
            TwilioCredentials::from_settings(&settings),
            Err(TwilioError::NotConfigured)
        ));

        settings.twilio_verify_service_sid = Some("VA456".to_string());
        let creds = TwilioCredentials::from_settings(&settings).unwrap();
        assert_eq!(creds.service_sid, "VA456");
        assert!(!format!("{creds:?}").contains("token\""));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(VerificationStatus::parse("canceled"), VerificationStatus::Canceled);
        assert_eq!(
            VerificationStatus::parse("max_attempts_reached"),
            VerificationStatus::Other("max_attempts_reached".to_string())
        );
    }
}
