//! Live Commerce Core - Shared domain types.
//!
//! This crate provides the domain vocabulary shared by every Live Commerce
//! component:
//! - `server` - Storefront API, merchant admin API and fulfillment webhooks
//! - `cli` - Command-line tools for migrations and merchant management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. The order lifecycle state machine lives here so
//! that every caller applies the same transition rules.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, phones, slugs,
//!   order codes and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
