//! HTTP middleware and request extractors.

pub mod app_proxy;
pub mod auth;
pub mod client_ip;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use app_proxy::{AppProxy, AppProxyRejection};
pub use auth::{RequireShop, ShopAuthRejection};
pub use client_ip::ClientIp;
pub use rate_limit::{order_rate_limiter, proxy_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
