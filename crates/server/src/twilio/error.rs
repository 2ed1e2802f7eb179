//! Twilio-related errors.

use thiserror::Error;

/// Errors that can occur when calling Twilio Verify.
#[derive(Debug, Error)]
pub enum TwilioError {
    /// HTTP request failed or the response could not be read.
    #[error("Twilio request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Twilio answered with a non-success status.
    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The shop has not saved complete Twilio credentials.
    #[error("Twilio is not configured")]
    NotConfigured,
}
