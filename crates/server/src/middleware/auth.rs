//! Authentication extractor for the merchant admin pages.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentShop, session_keys};

/// Extractor that requires a signed-in shop.
///
/// Redirects to the login page when the session has no shop.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireShop(current): RequireShop) -> impl IntoResponse {
///     format!("Hello, {}!", current.shop)
/// }
/// ```
pub struct RequireShop(pub CurrentShop);

/// Error returned when the request has no signed-in shop.
#[derive(Debug)]
pub enum ShopAuthRejection {
    /// Redirect to login page.
    RedirectToLogin,
    /// The session layer is missing.
    Unauthorized,
}

impl IntoResponse for ShopAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireShop
where
    S: Send + Sync,
{
    type Rejection = ShopAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(ShopAuthRejection::Unauthorized)?;

        let current: CurrentShop = session
            .get(session_keys::CURRENT_SHOP)
            .await
            .ok()
            .flatten()
            .ok_or(ShopAuthRejection::RedirectToLogin)?;

        sentry::configure_scope(|scope| {
            scope.set_tag("shop", current.shop.as_str());
        });

        Ok(Self(current))
    }
}
