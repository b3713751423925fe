//! Merchant catalog management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use live_commerce_core::{Money, ProductId};

use super::{JsonBody, non_blank};
use crate::error::{AppError, FieldError, Result};
use crate::middleware::RequireMerchant;
use crate::models::{Product, ProductFilter, ProductInput};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 200;
const MAX_SEARCH_LENGTH: usize = 100;

/// Catalog list filters, shared with the storefront.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    /// Substring of the name or description.
    pub q: Option<String>,
}

impl ProductQuery {
    /// Build a store filter.
    ///
    /// # Errors
    ///
    /// Returns a field error when the search term is too long.
    pub fn into_filter(
        self,
        include_inactive: bool,
    ) -> std::result::Result<ProductFilter, Vec<FieldError>> {
        let search = non_blank(self.q);
        if search
            .as_ref()
            .is_some_and(|q| q.chars().count() > MAX_SEARCH_LENGTH)
        {
            return Err(vec![FieldError::new(
                "q",
                format!("must be at most {MAX_SEARCH_LENGTH} characters"),
            )]);
        }
        Ok(ProductFilter {
            include_inactive,
            category: non_blank(self.category),
            search,
        })
    }
}

/// Product create/update body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i64,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub active: Option<bool>,
}

impl ProductRequest {
    /// Validate into product fields.
    ///
    /// # Errors
    ///
    /// Returns the list of invalid fields.
    pub fn validate(self) -> std::result::Result<ProductInput, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim().to_owned();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            errors.push(FieldError::new(
                "name",
                format!("must be 1-{MAX_NAME_LENGTH} characters"),
            ));
        }

        let price = Money::new(self.price)
            .map_err(|e| errors.push(FieldError::new("price", e.to_string())))
            .ok();

        let stock = i32::try_from(self.stock)
            .ok()
            .filter(|s| *s >= 0)
            .or_else(|| {
                errors.push(FieldError::new("stock", "must be a non-negative integer"));
                None
            });

        let image_url = non_blank(self.image_url);
        if let Some(raw) = &image_url
            && Url::parse(raw).is_err()
        {
            errors.push(FieldError::new("imageUrl", "must be an absolute URL"));
        }

        match (price, stock) {
            (Some(price), Some(stock)) if errors.is_empty() => Ok(ProductInput {
                name,
                description: non_blank(self.description),
                price,
                stock,
                category: non_blank(self.category),
                image_url,
                active: self.active.unwrap_or(true),
            }),
            _ => Err(errors),
        }
    }
}

pub(crate) fn not_found() -> AppError {
    AppError::NotFound("product not found".to_owned())
}

/// The merchant's products, inactive included.
pub async fn index(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = query.into_filter(true).map_err(AppError::Validation)?;
    let products = state
        .store()
        .list_products(merchant.tenant(), &filter)
        .await?;
    Ok(Json(products))
}

/// One of the merchant's products, active or not.
pub async fn show(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(id): Path<i32>,
) -> Result<Json<Product>> {
    let product = state
        .store()
        .product(merchant.tenant(), ProductId::new(id))
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(product))
}

/// Create a product.
pub async fn create(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    JsonBody(body): JsonBody<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let input = body.validate().map_err(AppError::Validation)?;
    let product = state
        .store()
        .create_product(merchant.tenant(), &input)
        .await?;
    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's fields.
pub async fn update(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(id): Path<i32>,
    JsonBody(body): JsonBody<ProductRequest>,
) -> Result<Json<Product>> {
    let input = body.validate().map_err(AppError::Validation)?;
    let product = state
        .store()
        .update_product(merchant.tenant(), ProductId::new(id), &input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(product))
}

/// Soft delete: the product disappears from the storefront but old orders
/// keep referring to it.
pub async fn deactivate(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    if state
        .store()
        .deactivate_product(merchant.tenant(), ProductId::new(id))
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}
