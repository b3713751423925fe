//! Merchant and store models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use live_commerce_core::{Email, Money, MerchantId, Phone, Slug, StoreId};

/// A merchant account. Merchants are deactivated, never deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub id: MerchantId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub slug: Slug,
    pub country: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A merchant together with its password hash, for login only.
#[derive(Debug, Clone)]
pub struct MerchantCredentials {
    pub merchant: Merchant,
    pub password_hash: String,
}

/// Everything needed to register a merchant and its store in one step.
#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub slug: Slug,
    pub password_hash: String,
    pub store_name: String,
    pub store_description: Option<String>,
    pub whatsapp: Option<Phone>,
}

/// The public face of a merchant: branding, contact and shipping rules.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Storefront {
    pub store_id: StoreId,
    pub merchant_id: MerchantId,
    pub slug: Slug,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    /// Flat shipping charged on every order.
    pub shipping_cost: Money,
    pub active: bool,
}

/// Merchant-editable store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub name: String,
    pub whatsapp: Option<Phone>,
    pub shipping_cost: Money,
}
