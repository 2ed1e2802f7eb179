//! Types stored in the merchant session.

pub mod session;

pub use session::{CurrentShop, PendingInstall, keys as session_keys};
