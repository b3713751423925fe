//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use live_commerce_core::{Email, MerchantId, Slug};

/// Session-stored merchant identity.
///
/// Minimal data stored in the session to identify the logged-in merchant.
/// The tenant for every admin request is derived from `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMerchant {
    /// Merchant's database ID.
    pub id: MerchantId,
    /// Login email.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Storefront slug.
    pub slug: Slug,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in merchant.
    pub const CURRENT_MERCHANT: &str = "current_merchant";
}
