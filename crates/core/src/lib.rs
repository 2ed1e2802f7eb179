//! COD Form Core - Shared domain types and pricing rules.
//!
//! This crate provides the types used across all COD Form components:
//! - `server` - App Proxy endpoints, admin pages and the checkout flow
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Shipping rate resolution and quantity discount
//! selection live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, shop domains, phone numbers and money
//! - [`pricing`] - Shipping rate resolution and quantity offer selection

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use types::*;
