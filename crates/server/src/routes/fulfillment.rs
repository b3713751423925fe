//! Fulfillment bot endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, header::AUTHORIZATION},
};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use live_commerce_core::{NotificationStatus, OrderCode, OrderId, OrderStatus};

use super::{JsonBody, non_blank};
use crate::error::{AppError, FieldError, Result, add_breadcrumb};
use crate::middleware::RequireMerchant;
use crate::models::{NotificationStats, OrderReference};
use crate::services::fulfillment::{self, Callback, STATS_WINDOW_HOURS};
use crate::state::AppState;

/// Inbound bot update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    /// Numeric id or order code.
    #[serde(alias = "orderId", alias = "orderCode")]
    pub order_id_or_code: Option<serde_json::Value>,
    pub external_status: Option<String>,
    pub customer_reply: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub customer_confirmed: bool,
}

impl CallbackRequest {
    /// Validate into a callback.
    ///
    /// # Errors
    ///
    /// Returns a field error when the order reference is missing or
    /// malformed.
    pub fn validate(self) -> std::result::Result<Callback, Vec<FieldError>> {
        let reference = self
            .order_id_or_code
            .as_ref()
            .and_then(parse_reference)
            .ok_or_else(|| {
                vec![FieldError::new(
                    "orderIdOrCode",
                    "must be an order id or order code",
                )]
            })?;

        Ok(Callback {
            reference,
            external_status: non_blank(self.external_status),
            customer_reply: non_blank(self.customer_reply),
            notes: non_blank(self.notes),
            customer_confirmed: self.customer_confirmed,
        })
    }
}

/// Interpret the bot's order key. Numeric strings may be either an id or a
/// code, so both are tried.
fn parse_reference(value: &serde_json::Value) -> Option<OrderReference> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(|id| OrderReference::Id(OrderId::new(id))),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            Some(match s.parse::<i32>() {
                Ok(id) => OrderReference::Ambiguous(OrderId::new(id), s.to_owned()),
                Err(_) => OrderReference::Code(s.to_owned()),
            })
        }
        _ => None,
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn check_callback_token(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.callback_token() else {
        return Ok(());
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if constant_time_eq(presented.as_bytes(), expected.expose_secret().as_bytes()) {
        Ok(())
    } else {
        tracing::warn!("Fulfillment callback rejected: bad token");
        Err(AppError::Unauthorized("invalid callback token".to_owned()))
    }
}

/// Callback result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Apply an inbound bot update.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<CallbackRequest>,
) -> Result<Json<CallbackResponse>> {
    check_callback_token(&state, &headers)?;
    let callback = body.validate().map_err(AppError::Validation)?;

    let applied = fulfillment::apply_callback(state.store(), &callback, Utc::now()).await?;
    let order = applied.order;

    add_breadcrumb(
        "fulfillment",
        "Callback applied",
        Some(&[("order_code", order.code.as_str())]),
    );
    tracing::info!(
        order_id = %order.id,
        previous = %applied.previous,
        status = %order.status,
        "Fulfillment callback applied"
    );

    Ok(Json(CallbackResponse {
        order_id: order.id,
        order_code: order.code,
        previous_status: applied.previous,
        new_status: order.status,
        updated_at: order.updated_at,
    }))
}

/// Resend result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResponse {
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub notification_status: NotificationStatus,
    pub notified_at: Option<DateTime<Utc>>,
}

/// Push an order to the bot again.
pub async fn resend(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(order_id): Path<i32>,
) -> Result<Json<ResendResponse>> {
    let order = state
        .notifier()
        .resend(state.store(), merchant.tenant(), OrderId::new(order_id))
        .await?;

    Ok(Json(ResendResponse {
        order_id: order.id,
        order_code: order.code,
        notification_status: order.notification.status,
        notified_at: order.notification.notified_at,
    }))
}

/// Notification health for the merchant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub enabled: bool,
    pub window_hours: i64,
    #[serde(flatten)]
    pub stats: NotificationStats,
}

/// Notification counters over the last day.
pub async fn status(
    State(state): State<AppState>,
    merchant: RequireMerchant,
) -> Result<Json<StatusResponse>> {
    let stats = fulfillment::notification_stats(state.store(), merchant.tenant(), Utc::now()).await?;
    Ok(Json(StatusResponse {
        enabled: state.notifier().is_enabled(),
        window_hours: STATS_WINDOW_HOURS,
        stats,
    }))
}
