//! Twilio Verify v2 client for phone OTPs.
//!
//! Credentials are per shop and come from the settings row, so the client
//! itself only holds the HTTP client and base URL. Callers build
//! [`TwilioCredentials`] from [`GeneralSettings`](crate::db::GeneralSettings)
//! for every request.

mod client;
mod error;

pub use client::{Channel, TwilioCredentials, VerificationStatus, VerifyClient};
pub use error::TwilioError;
