//! Shopify Admin API GraphQL client with OAuth authentication.
//!
//! [`AdminClient`] owns the app credentials and the shared HTTP client.
//! GraphQL calls go through a [`ShopAdmin`] bound to one shop's offline
//! token, so a single process serves every installed shop.

use std::sync::Arc;
use std::time::Duration;

use cod_form_core::ShopDomain;
use graphql_client::GraphQLQuery;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::ShopifyAppConfig;

use super::types::{CompletedOrder, DraftOrderInput, DraftOrderRef};
use super::{AdminShopifyError, GraphQLError};

pub mod queries;

use queries::{DraftOrderComplete, DraftOrderCreate};

/// Token returned by the OAuth code exchange.
#[derive(Clone)]
pub struct OAuthToken {
    /// Offline access token for API calls.
    pub access_token: SecretString,
    /// Granted scopes.
    pub scope: String,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Shopify Admin API client shared by all shops.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    api_version: String,
    client_id: String,
    client_secret: SecretString,
    scopes: String,
    /// Overrides `https://{shop}` for tests.
    base_url: Option<String>,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    path: Vec<serde_json::Value>,
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: String,
}

impl AdminClient {
    /// Create a new Admin API client.
    ///
    /// `timeout` bounds both connecting and the whole request.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyAppConfig, timeout: Duration) -> Result<Self, AdminShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(AdminClientInner {
                client,
                api_version: config.api_version.clone(),
                client_id: config.api_key.clone(),
                client_secret: config.api_secret.clone(),
                scopes: config.scopes.clone(),
                base_url: None,
            }),
        })
    }

    /// Send every shop's requests to `base_url` instead of the shop domain.
    #[must_use]
    pub fn with_base_url(config: &ShopifyAppConfig, base_url: &str) -> Self {
        Self {
            inner: Arc::new(AdminClientInner {
                client: reqwest::Client::new(),
                api_version: config.api_version.clone(),
                client_id: config.api_key.clone(),
                client_secret: config.api_secret.clone(),
                scopes: config.scopes.clone(),
                base_url: Some(base_url.trim_end_matches('/').to_string()),
            }),
        }
    }

    fn origin(&self, shop: &ShopDomain) -> String {
        self.inner
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL for `shop`.
    #[must_use]
    pub fn authorization_url(&self, shop: &ShopDomain, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            shop,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(&self.inner.scopes),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::OAuth` if Shopify rejects the exchange.
    /// Returns `AdminShopifyError::Http` if the HTTP request fails.
    #[instrument(skip(self, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<OAuthToken, AdminShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.origin(shop));

        let params = [
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdminShopifyError::OAuth(format!(
                "Token exchange failed: {text}"
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await?;

        Ok(OAuthToken {
            access_token: SecretString::from(token_response.access_token),
            scope: token_response.scope,
        })
    }

    /// Bind the client to a shop's access token.
    #[must_use]
    pub fn shop(&self, shop: &ShopDomain, access_token: &SecretString) -> ShopAdmin {
        ShopAdmin {
            client: self.clone(),
            endpoint: format!(
                "{}/admin/api/{}/graphql.json",
                self.origin(shop),
                self.inner.api_version
            ),
            shop: shop.clone(),
            access_token: access_token.clone(),
        }
    }
}

/// Admin API access for one shop.
#[derive(Clone)]
pub struct ShopAdmin {
    client: AdminClient,
    endpoint: String,
    shop: ShopDomain,
    access_token: SecretString,
}

impl std::fmt::Debug for ShopAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopAdmin")
            .field("shop", &self.shop)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ShopAdmin {
    /// The shop this client is bound to.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL query.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, AdminShopifyError>
    where
        Q::ResponseData: DeserializeOwned,
    {
        let body = Q::build_query(variables);

        let response = self
            .client
            .inner
            .client
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(AdminShopifyError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdminShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdminShopifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let graphql_response: GraphQLResponse<Q::ResponseData> = response.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    path: e.path,
                })
                .collect();
            return Err(AdminShopifyError::GraphQL(converted));
        }

        graphql_response.data.ok_or_else(|| {
            AdminShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    // =========================================================================
    // Draft orders
    // =========================================================================

    /// Create a draft order.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::UserErrors` if Shopify rejects the input,
    /// or any transport/GraphQL error from the call.
    #[instrument(skip(self, input), fields(shop = %self.shop, line_items = input.line_items.len()))]
    pub async fn create_draft_order(
        &self,
        input: &DraftOrderInput,
    ) -> Result<DraftOrderRef, AdminShopifyError> {
        let variables = queries::draft_order_create::Variables {
            input: input.clone(),
        };

        let response = self.execute::<DraftOrderCreate>(variables).await?;

        let payload = response.draft_order_create.ok_or_else(|| {
            AdminShopifyError::GraphQL(vec![GraphQLError {
                message: "draftOrderCreate returned no payload".to_string(),
                path: vec![],
            }])
        })?;

        if !payload.user_errors.is_empty() {
            return Err(AdminShopifyError::UserErrors(payload.user_errors));
        }

        payload.draft_order.ok_or_else(|| {
            AdminShopifyError::GraphQL(vec![GraphQLError {
                message: "draftOrderCreate returned no draft order".to_string(),
                path: vec![],
            }])
        })
    }

    /// Complete a draft order with payment pending.
    ///
    /// Returns `None` when Shopify completed the draft without returning an
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::UserErrors` if Shopify refuses to complete
    /// the draft, or any transport/GraphQL error from the call.
    #[instrument(skip(self), fields(shop = %self.shop, draft_order_id = %id))]
    pub async fn complete_draft_order(
        &self,
        id: &str,
    ) -> Result<Option<CompletedOrder>, AdminShopifyError> {
        let variables = queries::draft_order_complete::Variables {
            id: id.to_string(),
            payment_pending: true,
        };

        let response = self.execute::<DraftOrderComplete>(variables).await?;

        let Some(payload) = response.draft_order_complete else {
            return Ok(None);
        };

        if !payload.user_errors.is_empty() {
            return Err(AdminShopifyError::UserErrors(payload.user_errors));
        }

        Ok(payload.draft_order.and_then(|draft| draft.order))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_authorization_url() {
        let config = test_config();
        let client = AdminClient::new(&config.shopify, Duration::from_secs(5)).unwrap();
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();

        let url = client.authorization_url(&shop, "https://cod.test/auth/callback", "abc");

        assert!(url.starts_with("https://demo.myshopify.com/admin/oauth/authorize?"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fcod.test%2Fauth%2Fcallback"));
        assert!(url.contains("scope=write_draft_orders%2Cwrite_orders%2Cread_products"));
        assert!(url.ends_with("&state=abc"));
    }

    #[test]
    fn test_shop_endpoint_uses_api_version() {
        let config = test_config();
        let client = AdminClient::new(&config.shopify, Duration::from_secs(5)).unwrap();
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();

        let admin = client.shop(&shop, &SecretString::from("shpat_x"));

        assert_eq!(
            admin.endpoint,
            format!(
                "https://demo.myshopify.com/admin/api/{}/graphql.json",
                config.shopify.api_version
            )
        );
        assert_eq!(admin.shop(), &shop);
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = OAuthToken {
            access_token: SecretString::from("shpat_secret"),
            scope: "write_orders".to_string(),
        };
        assert!(!format!("{token:?}").contains("shpat_secret"));
    }
}
