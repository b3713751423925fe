//! Core types for Live Commerce.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod order_code;
pub mod phone;
pub mod price;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use order_code::{OrderCode, OrderCodeError};
pub use phone::{Phone, PhoneError};
pub use price::{Money, MoneyError};
pub use slug::{Slug, SlugError};
pub use status::*;
