//! Shopify Admin API client and request signature checks.
//!
//! # Architecture
//!
//! - One [`AdminClient`] per process holds the HTTP client and app credentials
//! - [`AdminClient::shop`] binds it to a shop's offline token for GraphQL calls
//! - Queries implement `graphql_client::GraphQLQuery` so request bodies share
//!   the `{query, variables, operationName}` envelope
//! - [`signature`] verifies App Proxy and OAuth callback signatures
//!
//! # Example
//!
//! ```rust,ignore
//! use cod_form_server::shopify::AdminClient;
//!
//! let client = AdminClient::new(&config.shopify, config.http_timeout)?;
//! let admin = client.shop(&shop, &session.access_token);
//!
//! let draft = admin.create_draft_order(&input).await?;
//! let order = admin.complete_draft_order(&draft.id).await?;
//! ```

mod admin;
pub mod signature;
pub mod types;

pub use admin::{AdminClient, OAuthToken, ShopAdmin};
pub use types::*;

use thiserror::Error;

/// Errors that can occur when interacting with Shopify Admin API.
#[derive(Debug, Error)]
pub enum AdminShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// Non-success HTTP status outside the cases below.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Mutation rejected its input.
    #[error("{}", join_user_errors(.0))]
    UserErrors(Vec<UserError>),

    /// OAuth code exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),
}

impl AdminShopifyError {
    /// Whether Shopify rejected the request content rather than failing to
    /// process it.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::UserErrors(_))
    }
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}
