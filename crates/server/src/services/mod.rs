//! Business logic services.
//!
//! # Services
//!
//! - `checkout` - COD order placement behind store, platform, verifier and
//!   exporter seams
//! - `otp` - OTP delivery with a per-phone cooldown
//! - `geoip` - Cached country lookup by client IP
//! - `webhook` - Fire-and-forget order export to the merchant's webhook

pub mod checkout;
pub mod geoip;
pub mod otp;
pub mod webhook;

pub use checkout::{
    CartItem, Checkout, CheckoutError, CheckoutRequest, CheckoutStore, CustomerInput,
    OrderExporter, OrderPlatform, PgStore, PhoneVerifier, PlacedOrder, ShippingSelection,
    TwilioVerifier,
};
pub use geoip::GeoIpService;
pub use otp::{OtpError, OtpSender, OtpSent, OtpStore, SendOtpRequest, send_otp};
pub use webhook::{OrderWebhookPayload, WebhookClient, WebhookCustomer};
