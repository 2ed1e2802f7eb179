//! Core types for COD Form.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod phone;
pub mod price;
pub mod shop;
pub mod status;

pub use id::*;
pub use phone::{PhoneError, PhoneNumber};
pub use price::{CurrencyCode, CurrencyError, Money};
pub use shop::{ShopDomain, ShopDomainError};
pub use status::*;
