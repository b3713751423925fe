//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Store readiness
//!
//! # Auth
//! POST /auth/login                      - Password login
//! POST /auth/logout                     - Logout
//! GET  /auth/me                         - Current merchant and store
//!
//! # Merchants (public)
//! POST /merchants                       - Register merchant + store
//! GET  /merchants/check-slug/{slug}     - Slug availability
//!
//! # Storefront (public, tenant by slug)
//! GET  /stores/{slug}                   - Store profile
//! GET  /stores/{slug}/products          - Active products (?category=&q=)
//! GET  /stores/{slug}/products/{id}     - One active product
//! POST /stores/{slug}/orders            - Place order
//!
//! # Admin (requires session, tenant from session)
//! GET  /store/settings                  - Store settings
//! PUT  /store/settings                  - Update settings
//! GET  /products                        - All products (?category=&q=)
//! POST /products                        - Create product
//! GET  /products/{id}                   - Product detail
//! PUT  /products/{id}                   - Update product
//! DELETE /products/{id}                 - Deactivate product
//! GET  /orders                          - List orders
//! POST /orders                          - Place order
//! GET  /orders/{id}                     - Order detail
//! PUT  /orders/{id}                     - Status and/or notes
//! PUT  /orders/{id}/status              - Same, under the lifecycle path
//! DELETE /orders/{id}                   - Cancel order
//! GET  /dashboard                       - Aggregates
//!
//! # Fulfillment
//! POST /fulfillment/callback            - Inbound bot update (bearer token)
//! POST /fulfillment/resend/{orderId}    - Manual resend (session)
//! GET  /fulfillment/status              - 24h notification counters (session)
//! ```

pub mod auth;
pub mod dashboard;
pub mod fulfillment;
pub mod merchants;
pub mod orders;
pub mod products;
pub mod settings;
pub mod storefront;

use axum::{
    Json, Router,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the common error body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Trim an optional string, mapping blank to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Build the application router (without middleware layers).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes())
        .route("/merchants", post(merchants::register))
        .route("/merchants/check-slug/{slug}", get(merchants::check_slug))
        .route("/stores/{slug}", get(storefront::profile))
        .route("/stores/{slug}/products", get(storefront::products))
        .route("/stores/{slug}/products/{id}", get(storefront::product))
        .route("/stores/{slug}/orders", post(storefront::place_order))
        .route(
            "/store/settings",
            get(settings::show).put(settings::update),
        )
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::deactivate),
        )
        .route("/orders", get(orders::index).post(orders::create))
        .route(
            "/orders/{id}",
            get(orders::show).put(orders::update).delete(orders::cancel),
        )
        .route("/orders/{id}/status", put(orders::update))
        .route("/dashboard", get(dashboard::show))
        .nest("/fulfillment", fulfillment_routes())
}

/// Create the auth routes router.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the fulfillment routes router.
fn fulfillment_routes() -> Router<AppState> {
    Router::new()
        .route("/callback", post(fulfillment::callback))
        .route("/resend/{order_id}", post(fulfillment::resend))
        .route("/status", get(fulfillment::status))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
