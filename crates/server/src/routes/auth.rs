//! OAuth install flow and merchant sessions.
//!
//! ```text
//! GET  /               - Send the merchant to /app, the install flow or login
//! GET  /auth?shop=     - Start OAuth: store a state nonce, redirect to Shopify
//! GET  /auth/callback  - Verify HMAC and state, exchange the code, sign in
//! GET  /auth/login     - Shop domain form
//! POST /auth/logout    - Clear the session
//! ```

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use cod_form_core::ShopDomain;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::db::ShopSessionRepository;
use crate::error::AppError;
use crate::models::{CurrentShop, PendingInstall, session_keys};
use crate::shopify::signature;
use crate::state::AppState;

/// Query parameters of `/` and `/auth`.
#[derive(Debug, Deserialize)]
pub struct ShopQuery {
    pub shop: Option<String>,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

/// Entry point Shopify opens the app on.
pub async fn index(session: Session, Query(query): Query<ShopQuery>) -> Redirect {
    let signed_in = session
        .get::<CurrentShop>(session_keys::CURRENT_SHOP)
        .await
        .ok()
        .flatten();

    match (signed_in, query.shop) {
        (Some(current), Some(shop)) if current.shop.as_str() != shop.trim().to_lowercase() => {
            Redirect::to(&format!("/auth?shop={}", urlencoding::encode(&shop)))
        }
        (Some(_), _) => Redirect::to("/app"),
        (None, Some(shop)) => Redirect::to(&format!("/auth?shop={}", urlencoding::encode(&shop))),
        (None, None) => Redirect::to("/auth/login"),
    }
}

/// Display the login page.
pub async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    LoginTemplate { error: query.error }
}

/// Start the OAuth install for a shop.
#[instrument(skip(state, session))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ShopQuery>,
) -> Result<Redirect, AppError> {
    let Some(shop) = query
        .shop
        .as_deref()
        .and_then(|s| ShopDomain::parse(s).ok())
    else {
        return Ok(Redirect::to("/auth/login?error=invalid_shop"));
    };

    let nonce = Uuid::new_v4().simple().to_string();
    session
        .insert(
            session_keys::PENDING_INSTALL,
            PendingInstall {
                shop: shop.clone(),
                state: nonce.clone(),
            },
        )
        .await?;

    let url = state.shopify().authorization_url(
        &shop,
        &state.config().oauth_redirect_uri(),
        &nonce,
    );
    tracing::info!(shop = %shop, "Redirecting to Shopify for authorization");
    Ok(Redirect::to(&url))
}

/// Finish the OAuth install.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let pairs = signature::parse_query(query.as_deref().unwrap_or_default());
    if !signature::verify_oauth_hmac(&pairs, &state.config().shopify.api_secret) {
        tracing::warn!("OAuth callback with invalid HMAC");
        return Err(AppError::Unauthorized("Invalid HMAC".to_string()));
    }

    let param = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    let shop = param("shop")
        .and_then(|s| ShopDomain::parse(s).ok())
        .ok_or_else(|| AppError::BadRequest("Invalid shop".to_string()))?;
    let code = param("code").ok_or_else(|| AppError::BadRequest("Missing code".to_string()))?;

    let pending: Option<PendingInstall> = session.remove(session_keys::PENDING_INSTALL).await?;
    let state_matches = pending.is_some_and(|p| {
        p.shop == shop && Some(p.state.as_str()) == param("state")
    });
    if !state_matches {
        tracing::warn!(shop = %shop, "OAuth callback with unknown state");
        return Err(AppError::Forbidden("OAuth state mismatch".to_string()));
    }

    let token = state.shopify().exchange_code(&shop, code).await?;
    ShopSessionRepository::new(state.pool())
        .save(&shop, token.access_token.expose_secret(), &token.scope)
        .await?;

    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_SHOP, CurrentShop { shop: shop.clone() })
        .await?;

    tracing::info!(shop = %shop, scope = %token.scope, "App installed");
    Ok(Redirect::to("/app").into_response())
}

/// Sign the merchant out.
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/auth/login"))
}
