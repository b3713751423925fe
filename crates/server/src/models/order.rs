//! Order models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use live_commerce_core::{
    Email, MerchantId, Money, NotificationStatus, OrderCode, OrderId, OrderStatus, Phone,
    ProductId, StatusError,
};

/// Customer contact captured on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub phone: Phone,
    pub name: String,
    pub email: Option<Email>,
    pub address: Option<String>,
}

/// One line of the order, priced when the order was placed.
///
/// Stored both in the order's JSON snapshot and as a normalized row, so
/// later price or name changes never rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Delivery state of the fulfillment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub notified_at: Option<DateTime<Utc>>,
}

/// A persisted order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(skip)]
    pub merchant_id: MerchantId,
    pub code: OrderCode,
    pub customer: Customer,
    pub items: Vec<OrderLine>,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub notification: NotificationState,
    /// Raw callbacks from the fulfillment bot, oldest first.
    pub fulfillment_log: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fully priced order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub code: OrderCode,
    pub idempotency_key: Option<String>,
    pub customer: Customer,
    pub items: Vec<OrderLine>,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Why an order insert did not commit. Nothing is written in any case.
#[derive(Debug, thiserror::Error)]
pub enum InsertOrderError {
    /// Another order already holds the code.
    #[error("order code already taken")]
    CodeTaken,
    /// The tenant already placed an order with this idempotency key.
    #[error("idempotency key already used")]
    DuplicateIdempotencyKey,
    /// A conditional decrement matched no row.
    #[error("insufficient stock for product {0}")]
    OutOfStock(ProductId),
    #[error(transparent)]
    Repository(#[from] crate::db::RepositoryError),
}

/// Filters for the admin order list.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// How the fulfillment bot refers to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderReference {
    Id(OrderId),
    Code(String),
    /// A numeric string: tried as an id first, then as a code.
    Ambiguous(OrderId, String),
}

/// Result of a single notification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed(String),
    Disabled,
}

impl NotificationOutcome {
    /// The status this outcome records.
    #[must_use]
    pub const fn status(&self) -> NotificationStatus {
        match self {
            Self::Sent => NotificationStatus::Sent,
            Self::Failed(_) => NotificationStatus::Failed,
            Self::Disabled => NotificationStatus::Disabled,
        }
    }
}

/// Result of an admin status change.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// Applied, or a no-op when the order was already in the requested state.
    Applied { order: Order, previous: OrderStatus },
    Rejected(StatusError),
}

/// A fulfillment bot callback, already mapped to the internal vocabulary.
#[derive(Debug, Clone)]
pub struct CallbackUpdate {
    /// Requested status, applied only if the lifecycle allows it.
    pub target: Option<OrderStatus>,
    /// Entry appended to the order's fulfillment log.
    pub log_entry: serde_json::Value,
    /// Text appended to the order notes.
    pub notes: Option<String>,
}

/// The order after a callback, plus the status it had before.
#[derive(Debug, Clone)]
pub struct CallbackApplied {
    pub order: Order,
    pub previous: OrderStatus,
}

/// Notification counters over a time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub with_response: i64,
    pub confirmed: i64,
    pub cancelled: i64,
}

/// Separator placed between existing notes and bot-supplied notes.
pub const NOTES_SEPARATOR: &str = "\n--- Fulfillment ---\n";

/// Append bot notes to the existing ones without overwriting them.
#[must_use]
pub fn append_notes(existing: Option<&str>, addition: &str) -> String {
    match existing {
        Some(current) if !current.trim().is_empty() => {
            format!("{current}{NOTES_SEPARATOR}{addition}")
        }
        _ => addition.to_owned(),
    }
}
