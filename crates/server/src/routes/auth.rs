//! Merchant login, logout and session identity.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::JsonBody;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireMerchant, clear_current_merchant, set_current_merchant};
use crate::models::{CurrentMerchant, Merchant, Storefront};
use crate::services::AuthService;
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The logged-in merchant and their store.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub merchant: Merchant,
    pub store: Option<Storefront>,
}

/// Store the merchant in the session and tag Sentry.
pub(crate) async fn start_session(session: &Session, merchant: &Merchant) -> Result<()> {
    let current = CurrentMerchant {
        id: merchant.id,
        email: merchant.email.clone(),
        name: merchant.name.clone(),
        slug: merchant.slug.clone(),
    };
    set_current_merchant(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&merchant.id, Some(merchant.email.as_str()));
    Ok(())
}

/// Handle password login.
#[tracing::instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(form): JsonBody<LoginRequest>,
) -> Result<Json<Merchant>> {
    let merchant = AuthService::new(state.store())
        .login(&form.email, &form.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Login failed");
            e
        })?;

    start_session(&session, &merchant).await?;
    tracing::info!(merchant_id = %merchant.id, "Merchant logged in");

    Ok(Json(merchant))
}

/// Handle logout.
pub async fn logout(_merchant: RequireMerchant, session: Session) -> Result<impl IntoResponse> {
    clear_current_merchant(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The current merchant, re-read from the store.
///
/// A merchant deactivated after login is treated as logged out.
pub async fn me(
    State(state): State<AppState>,
    merchant: RequireMerchant,
) -> Result<Json<MeResponse>> {
    let tenant = merchant.tenant();
    let current = state
        .store()
        .merchant(tenant.merchant_id())
        .await?
        .filter(|m| m.active)
        .ok_or_else(|| AppError::Unauthorized("login required".to_owned()))?;
    let store = state.store().storefront(tenant).await?;

    Ok(Json(MeResponse {
        merchant: current,
        store,
    }))
}
