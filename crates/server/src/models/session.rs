//! Session-related types for merchant authentication.

use cod_form_core::ShopDomain;
use serde::{Deserialize, Serialize};

/// The shop whose admin is signed in.
///
/// Stored after a completed OAuth callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentShop {
    pub shop: ShopDomain,
}

/// An OAuth install waiting for its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInstall {
    pub shop: ShopDomain,
    pub state: String,
}

/// Session keys for merchant authentication data.
pub mod keys {
    /// Key for storing the signed-in shop.
    pub const CURRENT_SHOP: &str = "current_shop";

    /// Key for the [`super::PendingInstall`] between `/auth` and `/auth/callback`.
    pub const PENDING_INSTALL: &str = "oauth_state";
}
