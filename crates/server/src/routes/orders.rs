//! Order routes for merchants, plus the request type shared with the public
//! storefront checkout.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use live_commerce_core::{Email, Money, OrderCode, OrderId, OrderStatus, Phone, ProductId};

use super::{JsonBody, non_blank};
use crate::error::{AppError, FieldError, Result};
use crate::middleware::RequireMerchant;
use crate::models::{Customer, Order, OrderFilter};
use crate::services::stock::merge_lines;
use crate::services::{LineRequest, OrderDraft, OrderError, OrderUpdate};
use crate::state::AppState;
use crate::tenant::Tenant;

/// Header carrying the client's retry key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 128;
const MAX_NAME_LENGTH: usize = 200;
const MAX_PAYMENT_METHOD_LENGTH: usize = 50;
const MAX_NOTES_LENGTH: usize = 2000;

/// Customer section of an order request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// One cart line as sent by the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price shown when the item was added. Never charged.
    pub unit_price_at_add: Option<Decimal>,
}

/// Order request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer: Option<CustomerInput>,
    #[serde(default)]
    pub items: Vec<ItemInput>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    /// Validate the body and the idempotency header into a draft.
    ///
    /// All field problems are reported together.
    ///
    /// # Errors
    ///
    /// Returns the list of invalid fields.
    pub fn validate(
        self,
        idempotency_key: Option<&str>,
    ) -> std::result::Result<OrderDraft, Vec<FieldError>> {
        let mut errors = Vec::new();
        let input = self.customer.unwrap_or_default();

        let phone = match non_blank(input.phone) {
            None => {
                errors.push(FieldError::new("customer.phone", "phone is required"));
                None
            }
            Some(raw) => Phone::parse(&raw)
                .map_err(|e| errors.push(FieldError::new("customer.phone", e.to_string())))
                .ok(),
        };

        let name = non_blank(input.name);
        match &name {
            None => errors.push(FieldError::new("customer.name", "name is required")),
            Some(n) if n.chars().count() > MAX_NAME_LENGTH => errors.push(FieldError::new(
                "customer.name",
                format!("must be at most {MAX_NAME_LENGTH} characters"),
            )),
            Some(_) => {}
        }

        let email = non_blank(input.email).and_then(|raw| {
            Email::normalized(&raw)
                .map_err(|e| errors.push(FieldError::new("customer.email", e.to_string())))
                .ok()
        });

        if self.items.is_empty() {
            errors.push(FieldError::new("items", "cart must not be empty"));
        }
        let mut lines = Vec::with_capacity(self.items.len());
        for (i, item) in self.items.into_iter().enumerate() {
            if item.quantity <= 0 {
                errors.push(FieldError::new(
                    format!("items[{i}].quantity"),
                    "must be a positive integer",
                ));
                continue;
            }
            let Ok(quantity) = u32::try_from(item.quantity) else {
                errors.push(FieldError::new(format!("items[{i}].quantity"), "too large"));
                continue;
            };
            lines.push(LineRequest {
                product_id: item.product_id,
                quantity,
                price_hint: item.unit_price_at_add,
            });
        }

        let payment_method = non_blank(self.payment_method);
        if payment_method
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_PAYMENT_METHOD_LENGTH)
        {
            errors.push(FieldError::new(
                "paymentMethod",
                format!("must be at most {MAX_PAYMENT_METHOD_LENGTH} characters"),
            ));
        }

        let notes = non_blank(self.notes);
        if notes
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH)
        {
            errors.push(FieldError::new(
                "notes",
                format!("must be at most {MAX_NOTES_LENGTH} characters"),
            ));
        }

        if let Some(key) = idempotency_key
            && !is_valid_idempotency_key(key)
        {
            errors.push(FieldError::new(
                "Idempotency-Key",
                format!("must be 1-{MAX_IDEMPOTENCY_KEY_LENGTH} visible ASCII characters"),
            ));
        }

        match (phone, name) {
            (Some(phone), Some(name)) if errors.is_empty() => Ok(OrderDraft {
                customer: Customer {
                    phone,
                    name,
                    email,
                    address: non_blank(input.address),
                },
                lines: merge_lines(lines),
                payment_method,
                notes,
                idempotency_key: idempotency_key.map(str::to_owned),
            }),
            _ => Err(errors),
        }
    }
}

fn is_valid_idempotency_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_IDEMPOTENCY_KEY_LENGTH
        && key.bytes().all(|b| b.is_ascii_graphic())
}

/// Read the idempotency header. A header that is not valid UTF-8 is passed
/// through as an empty key so validation rejects it.
fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| v.to_str().unwrap_or_default())
}

/// Summary returned when an order is placed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedResponse {
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for PlacedResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            order_code: order.code.clone(),
            status: order.status,
            subtotal: order.subtotal,
            shipping: order.shipping,
            total: order.total,
            created_at: order.created_at,
        }
    }
}

/// Validate and place an order for `tenant`.
///
/// `201 Created` for a new order, `200 OK` for an idempotent replay.
pub(crate) async fn place_for(
    state: &AppState,
    tenant: Tenant,
    headers: &HeaderMap,
    body: CreateOrderRequest,
) -> Result<Response> {
    let draft = body
        .validate(idempotency_key(headers))
        .map_err(AppError::Validation)?;

    let placed = state.orders().place(tenant, draft).await?;
    let status = if placed.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(PlacedResponse::from(&placed.order))).into_response())
}

/// Order list filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (start of day, UTC).
    pub from: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (end of day, UTC).
    pub to: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> std::result::Result<OrderFilter, Vec<FieldError>> {
        let mut errors = Vec::new();

        let status = non_blank(self.status).and_then(|raw| {
            raw.parse::<OrderStatus>()
                .map_err(|e| errors.push(FieldError::new("status", e.to_string())))
                .ok()
        });
        let created_from = non_blank(self.from).and_then(|raw| {
            parse_bound(&raw, NaiveTime::MIN)
                .or_else(|| {
                    errors.push(FieldError::new("from", "expected a date or RFC 3339 timestamp"));
                    None
                })
        });
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        let created_to = non_blank(self.to).and_then(|raw| {
            parse_bound(&raw, end_of_day).or_else(|| {
                errors.push(FieldError::new("to", "expected a date or RFC 3339 timestamp"));
                None
            })
        });

        if errors.is_empty() {
            Ok(OrderFilter {
                status,
                created_from,
                created_to,
            })
        } else {
            Err(errors)
        }
    }
}

fn parse_bound(raw: &str, time: NaiveTime) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(time).and_utc())
        })
}

/// Order edit body. At least one field is required.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub status: Option<String>,
    /// Replaces the notes. Blank clears them, absent or `null` keeps them.
    pub notes: Option<String>,
}

impl UpdateRequest {
    /// Parse the body into an order edit.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Status` for an unknown status, and a validation
    /// error for oversized notes or an empty body.
    pub fn into_update(self) -> Result<OrderUpdate> {
        let status = non_blank(self.status)
            .map(|raw| raw.parse::<OrderStatus>())
            .transpose()
            .map_err(OrderError::from)?;

        let notes = self.notes.map(|raw| non_blank(Some(raw)));
        if let Some(Some(text)) = &notes
            && text.chars().count() > MAX_NOTES_LENGTH
        {
            return Err(AppError::Validation(vec![FieldError::new(
                "notes",
                format!("must be at most {MAX_NOTES_LENGTH} characters"),
            )]));
        }

        if status.is_none() && notes.is_none() {
            return Err(AppError::Validation(vec![FieldError::new(
                "status",
                "status or notes is required",
            )]));
        }
        Ok(OrderUpdate { status, notes })
    }
}

/// List the merchant's orders.
pub async fn index(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>> {
    let filter = query.into_filter().map_err(AppError::Validation)?;
    let orders = state.orders().list(merchant.tenant(), &filter).await?;
    Ok(Json(orders))
}

/// Place an order on behalf of the logged-in merchant.
pub async fn create(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    headers: HeaderMap,
    JsonBody(body): JsonBody<CreateOrderRequest>,
) -> Result<Response> {
    place_for(&state, merchant.tenant(), &headers, body).await
}

/// Order detail.
pub async fn show(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .get(merchant.tenant(), OrderId::new(id))
        .await?;
    Ok(Json(order))
}

/// Move an order along its lifecycle and/or replace its notes.
pub async fn update(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(id): Path<i32>,
    JsonBody(body): JsonBody<UpdateRequest>,
) -> Result<Json<Order>> {
    let update = body.into_update()?;
    let order = state
        .orders()
        .update(merchant.tenant(), OrderId::new(id), update)
        .await?;
    Ok(Json(order))
}

/// Cancel an order.
pub async fn cancel(
    State(state): State<AppState>,
    merchant: RequireMerchant,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .cancel(merchant.tenant(), OrderId::new(id))
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(body: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_validate_ok() {
        let draft = parse(json!({
            "customer": {"phone": "+1555", "name": " Jane ", "email": ""},
            "items": [
                {"productId": 1, "quantity": 2, "unitPriceAtAdd": "10.00"},
                {"productId": 1, "quantity": 1}
            ],
            "notes": "  "
        }))
        .validate(Some("retry-1"))
        .unwrap();

        assert_eq!(draft.customer.name, "Jane");
        assert!(draft.customer.email.is_none());
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].quantity, 3);
        assert!(draft.notes.is_none());
        assert_eq!(draft.idempotency_key.as_deref(), Some("retry-1"));
    }

    #[test]
    fn test_validate_empty_cart() {
        let errors = parse(json!({
            "customer": {"phone": "+1555", "name": "Jane"},
            "items": []
        }))
        .validate(None)
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "items");
    }

    #[test]
    fn test_validate_reports_all_fields() {
        let errors = parse(json!({
            "customer": {"email": "not-an-email"},
            "items": [{"productId": 1, "quantity": 0}, {"productId": 2, "quantity": -3}]
        }))
        .validate(Some("has space"))
        .unwrap_err();

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "customer.phone",
                "customer.name",
                "customer.email",
                "items[0].quantity",
                "items[1].quantity",
                "Idempotency-Key",
            ]
        );
    }

    #[test]
    fn test_update_request() {
        let update = UpdateRequest {
            status: Some(" shipped ".into()),
            notes: None,
        }
        .into_update()
        .unwrap();
        assert_eq!(update.status, Some(OrderStatus::Shipped));
        assert!(update.notes.is_none());

        let update = UpdateRequest {
            status: None,
            notes: Some("  ".into()),
        }
        .into_update()
        .unwrap();
        assert!(update.status.is_none());
        assert_eq!(update.notes, Some(None));

        assert!(matches!(
            UpdateRequest::default().into_update(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            UpdateRequest {
                status: Some("lost".into()),
                notes: None,
            }
            .into_update(),
            Err(AppError::Order(OrderError::Status(_)))
        ));
        assert!(matches!(
            UpdateRequest {
                status: None,
                notes: Some("x".repeat(MAX_NOTES_LENGTH + 1)),
            }
            .into_update(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_list_query() {
        let filter = ListQuery {
            status: Some("shipped".into()),
            from: Some("2026-03-01".into()),
            to: Some("2026-03-02T12:00:00Z".into()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Shipped));
        assert_eq!(
            filter.created_from.unwrap().to_rfc3339(),
            "2026-03-01T00:00:00+00:00"
        );

        let errors = ListQuery {
            status: Some("lost".into()),
            from: Some("yesterday".into()),
            to: None,
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
