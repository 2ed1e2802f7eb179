//! Customer phone numbers.
//!
//! Storefront customers type numbers in whatever local format they are used
//! to (`0300 1234567`, `92-300-1234567`, `+92 300 1234567`). Everything that
//! keys on a phone number (OTP verification, OTP cooldown, order spam
//! throttling) goes through [`PhoneNumber::normalize`] first so those forms
//! collapse to one value.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when normalizing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contained no digits.
    #[error("phone number must contain digits")]
    NoDigits,
}

/// A phone number in the canonical form used for verification and logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Country calling code applied to local numbers.
    pub const COUNTRY_CODE: &'static str = "92";

    /// Domestic trunk prefix dialled before local numbers.
    pub const TRUNK_PREFIX: char = '0';

    /// Normalize a raw phone number.
    ///
    /// - An 11-digit number starting with `0` becomes `+92` plus its last ten digits.
    /// - A 12-digit number starting with `92` gets a leading `+`.
    /// - Input already starting with `+` becomes `+` followed by its digits.
    /// - Anything else is kept as typed, minus surrounding whitespace.
    ///
    /// ```
    /// use cod_form_core::PhoneNumber;
    ///
    /// let phone = PhoneNumber::normalize("0300-1234567").unwrap();
    /// assert_eq!(phone.as_str(), "+923001234567");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::NoDigits`] if the input has no digits at all.
    pub fn normalize(raw: &str) -> Result<Self, PhoneError> {
        let trimmed = raw.trim();
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneError::NoDigits);
        }

        if digits.len() == 11 && digits.starts_with(Self::TRUNK_PREFIX) {
            let local = digits.get(1..).unwrap_or_default();
            return Ok(Self(format!("+{}{local}", Self::COUNTRY_CODE)));
        }

        if digits.len() == 12 && digits.starts_with(Self::COUNTRY_CODE) {
            return Ok(Self(format!("+{digits}")));
        }

        if trimmed.starts_with('+') {
            return Ok(Self(format!("+{digits}")));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the normalized number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns only the digits of the number, without the leading `+`.
    #[must_use]
    pub fn digits(&self) -> String {
        self.0.chars().filter(char::is_ascii_digit).collect()
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
