//! Merchant dashboard.

use axum::{Json, extract::State};
use chrono::Utc;

use crate::error::Result;
use crate::middleware::RequireMerchant;
use crate::models::Dashboard;
use crate::services::dashboard;
use crate::state::AppState;

/// Aggregates for the logged-in merchant.
pub async fn show(
    State(state): State<AppState>,
    merchant: RequireMerchant,
) -> Result<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    let dashboard = dashboard::build(state.store(), merchant.tenant(), today).await?;
    Ok(Json(dashboard))
}
