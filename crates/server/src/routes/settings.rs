//! Merchant store settings.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use live_commerce_core::{Money, Phone};

use super::{JsonBody, non_blank};
use crate::error::{AppError, FieldError, Result};
use crate::middleware::RequireMerchant;
use crate::models::{StoreSettings, Storefront};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 100;

/// Settings update body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub name: String,
    /// Blank or absent clears the number.
    pub whatsapp: Option<String>,
    pub shipping_cost: Decimal,
}

impl SettingsRequest {
    /// Validate into store settings.
    ///
    /// # Errors
    ///
    /// Returns the list of invalid fields.
    pub fn validate(self) -> std::result::Result<StoreSettings, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim().to_owned();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            errors.push(FieldError::new(
                "name",
                format!("must be 1-{MAX_NAME_LENGTH} characters"),
            ));
        }

        let whatsapp = non_blank(self.whatsapp).and_then(|raw| {
            Phone::parse_whatsapp(&raw)
                .map_err(|e| errors.push(FieldError::new("whatsapp", e.to_string())))
                .ok()
        });

        let shipping_cost = Money::new(self.shipping_cost)
            .map_err(|e| errors.push(FieldError::new("shippingCost", e.to_string())))
            .ok();

        match shipping_cost {
            Some(shipping_cost) if errors.is_empty() => Ok(StoreSettings {
                name,
                whatsapp,
                shipping_cost,
            }),
            _ => Err(errors),
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("store not found".to_owned())
}

/// Current store settings.
pub async fn show(
    State(state): State<AppState>,
    merchant: RequireMerchant,
) -> Result<Json<Storefront>> {
    let store = state
        .store()
        .storefront(merchant.tenant())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(store))
}

/// Update name, WhatsApp number and shipping cost.
pub async fn update(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    JsonBody(body): JsonBody<SettingsRequest>,
) -> Result<Json<Storefront>> {
    let settings = body.validate().map_err(AppError::Validation)?;
    let store = state
        .store()
        .update_store_settings(merchant.tenant(), &settings)
        .await?
        .ok_or_else(not_found)?;
    tracing::info!(store_id = %store.store_id, "Store settings updated");
    Ok(Json(store))
}
