//! Public storefront routes. The tenant comes from the slug in the path.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Serialize;

use live_commerce_core::{Money, ProductId, Slug};

use super::JsonBody;
use super::orders::{CreateOrderRequest, place_for};
use super::products::{ProductQuery, not_found};
use crate::error::{AppError, Result};
use crate::models::{Product, Storefront};
use crate::state::AppState;
use crate::tenant::Tenant;

/// What shoppers see about a store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProfile {
    pub slug: Slug,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub tiktok: Option<String>,
    pub shipping_cost: Money,
}

impl From<Storefront> for StoreProfile {
    fn from(store: Storefront) -> Self {
        Self {
            slug: store.slug,
            name: store.name,
            description: store.description,
            logo_url: store.logo_url,
            primary_color: store.primary_color,
            secondary_color: store.secondary_color,
            whatsapp: store.whatsapp,
            instagram: store.instagram,
            tiktok: store.tiktok,
            shipping_cost: store.shipping_cost,
        }
    }
}

/// Public store profile.
pub async fn profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<StoreProfile>> {
    let (_, storefront) = Tenant::resolve_slug(state.store(), &slug).await?;
    Ok(Json(storefront.into()))
}

/// Active products of a store.
pub async fn products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = query.into_filter(false).map_err(AppError::Validation)?;
    let (tenant, _) = Tenant::resolve_slug(state.store(), &slug).await?;
    let products = state.store().list_products(tenant, &filter).await?;
    Ok(Json(products))
}

/// One active product of a store.
pub async fn product(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i32)>,
) -> Result<Json<Product>> {
    let (tenant, _) = Tenant::resolve_slug(state.store(), &slug).await?;
    let product = state
        .store()
        .product(tenant, ProductId::new(id))
        .await?
        .filter(|p| p.active)
        .ok_or_else(not_found)?;
    Ok(Json(product))
}

/// Shopper checkout.
#[tracing::instrument(skip(state, headers, body))]
pub async fn place_order(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<CreateOrderRequest>,
) -> Result<Response> {
    let (tenant, _) = Tenant::resolve_slug(state.store(), &slug).await?;
    place_for(&state, tenant, &headers, body).await
}
