//! Fulfillment bot integration.
//!
//! Outbound: after an order commits, its payload is pushed to the configured
//! webhook from a detached task. The outcome lands in the order's
//! notification status and never affects the order itself. Merchants can
//! resend by hand.
//!
//! Inbound: the bot reports back with its own status vocabulary. Each
//! callback is appended to the order's fulfillment log, and the mapped
//! status is applied when the lifecycle allows it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use live_commerce_core::{Money, OrderCode, OrderId, OrderStatus};

use crate::config::FulfillmentConfig;
use crate::db::{OrderStore, RepositoryError, Store};
use crate::models::{
    CallbackApplied, CallbackUpdate, Customer, NotificationOutcome, NotificationStats, Order,
    OrderLine, OrderReference,
};
use crate::tenant::Tenant;

/// Window for the notification counters.
pub const STATS_WINDOW_HOURS: i64 = 24;

/// Errors delivering a payload to the bot.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No webhook is configured.
    #[error("fulfillment notifications are disabled")]
    Disabled,

    /// Connection failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bot answered with a non-success status.
    #[error("webhook returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Errors from resend and callback handling.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("fulfillment notifications are disabled")]
    Disabled,

    #[error("order not found")]
    OrderNotFound,

    #[error("notification failed: {0}")]
    Delivery(NotifyError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Why a payload is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationEvent {
    #[serde(rename = "order.created")]
    Created,
    #[serde(rename = "order.resent")]
    Resent,
}

/// The JSON body posted to the webhook.
#[derive(Debug, Serialize)]
pub struct NotificationPayload<'a> {
    pub event: NotificationEvent,
    pub order: OrderPayload<'a>,
}

/// Order section of the webhook body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload<'a> {
    pub id: OrderId,
    pub code: &'a OrderCode,
    pub customer: &'a Customer,
    pub items: &'a [OrderLine],
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub payment_method: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

impl<'a> NotificationPayload<'a> {
    /// Build the payload for an order.
    #[must_use]
    pub fn new(order: &'a Order, event: NotificationEvent) -> Self {
        Self {
            event,
            order: OrderPayload {
                id: order.id,
                code: &order.code,
                customer: &order.customer,
                items: &order.items,
                subtotal: order.subtotal,
                shipping: order.shipping,
                total: order.total,
                payment_method: order.payment_method.as_deref(),
                notes: order.notes.as_deref(),
                created_at: order.created_at,
            },
        }
    }
}

/// Client for the fulfillment webhook.
#[derive(Clone)]
pub struct FulfillmentNotifier {
    client: reqwest::Client,
    endpoint: Option<Url>,
}

impl FulfillmentNotifier {
    /// Build a notifier with the configured endpoint and timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FulfillmentConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.webhook_url.clone(),
        })
    }

    /// A notifier with no endpoint. Every attempt records `disabled`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: None,
        }
    }

    /// Whether a webhook is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Post the order payload once.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Disabled` without an endpoint, `Http` on
    /// transport failure or timeout, `Api` on a non-2xx answer.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, code = %order.code))]
    pub async fn send(&self, order: &Order, event: NotificationEvent) -> Result<(), NotifyError> {
        let endpoint = self.endpoint.as_ref().ok_or(NotifyError::Disabled)?;

        let response = self
            .client
            .post(endpoint.clone())
            .json(&NotificationPayload::new(order, event))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Send and record the outcome on the order.
    ///
    /// Failures are logged, never returned: the order stays as it is and can
    /// be resent.
    pub async fn notify<S>(
        &self,
        store: &S,
        tenant: Tenant,
        order: &Order,
        event: NotificationEvent,
    ) -> NotificationOutcome
    where
        S: OrderStore + ?Sized,
    {
        let outcome = match self.send(order, event).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, code = %order.code, "Fulfillment notified");
                NotificationOutcome::Sent
            }
            Err(NotifyError::Disabled) => {
                tracing::debug!(order_id = %order.id, "Fulfillment webhook not configured");
                NotificationOutcome::Disabled
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Fulfillment notification failed");
                NotificationOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = store.record_notification(tenant, order.id, &outcome).await {
            tracing::error!(
                order_id = %order.id,
                error = %e,
                "Failed to record notification outcome"
            );
        }

        outcome
    }

    /// Notify from a detached task so the caller never waits on the bot.
    pub fn dispatch(
        &self,
        store: Arc<dyn Store>,
        tenant: Tenant,
        order: Order,
    ) -> JoinHandle<NotificationOutcome> {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier
                .notify(store.as_ref(), tenant, &order, NotificationEvent::Created)
                .await
        })
    }

    /// Rebuild the payload for an existing order and send it again.
    ///
    /// Only a successful send marks the order `sent`; a failure never
    /// downgrades an earlier success.
    ///
    /// # Errors
    ///
    /// Returns `Disabled` without an endpoint, `OrderNotFound` when the order
    /// is not the tenant's, `Delivery` when the send fails.
    #[tracing::instrument(skip(self, store))]
    pub async fn resend<S>(
        &self,
        store: &S,
        tenant: Tenant,
        id: OrderId,
    ) -> Result<Order, FulfillmentError>
    where
        S: OrderStore + ?Sized,
    {
        if !self.is_enabled() {
            return Err(FulfillmentError::Disabled);
        }
        let order = store
            .order(tenant, id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound)?;

        match self.send(&order, NotificationEvent::Resent).await {
            Ok(()) => {
                store
                    .record_notification(tenant, id, &NotificationOutcome::Sent)
                    .await?;
                tracing::info!(order_id = %id, "Fulfillment notification resent");
                store
                    .order(tenant, id)
                    .await?
                    .ok_or(FulfillmentError::OrderNotFound)
            }
            Err(e) => {
                store
                    .record_notification(tenant, id, &NotificationOutcome::Failed(e.to_string()))
                    .await?;
                Err(FulfillmentError::Delivery(e))
            }
        }
    }
}

/// An inbound status report from the bot.
#[derive(Debug, Clone)]
pub struct Callback {
    pub reference: OrderReference,
    pub external_status: Option<String>,
    pub customer_reply: Option<String>,
    pub notes: Option<String>,
    pub customer_confirmed: bool,
}

impl Callback {
    /// The internal status this callback asks for.
    ///
    /// `customer_confirmed` wins over the external status. Unknown external
    /// words request nothing.
    #[must_use]
    pub fn target(&self) -> Option<OrderStatus> {
        if self.customer_confirmed {
            return Some(OrderStatus::Confirmed);
        }
        self.external_status
            .as_deref()
            .and_then(OrderStatus::from_external)
    }

    /// The entry appended to the order's fulfillment log.
    #[must_use]
    pub fn log_entry(&self, received_at: DateTime<Utc>) -> serde_json::Value {
        serde_json::json!({
            "receivedAt": received_at,
            "externalStatus": self.external_status,
            "customerReply": self.customer_reply,
            "notes": self.notes,
            "customerConfirmed": self.customer_confirmed,
        })
    }
}

/// Apply a bot callback to the order it names.
///
/// The bot does not know tenants, so the order is found by id or code
/// across all of them; every write after that is scoped to the order's own
/// tenant.
///
/// # Errors
///
/// Returns `OrderNotFound` when neither key matches.
#[tracing::instrument(skip(store, callback), fields(reference = ?callback.reference))]
pub async fn apply_callback<S>(
    store: &S,
    callback: &Callback,
    received_at: DateTime<Utc>,
) -> Result<CallbackApplied, FulfillmentError>
where
    S: OrderStore + ?Sized,
{
    let order = store
        .order_by_reference(&callback.reference)
        .await?
        .ok_or(FulfillmentError::OrderNotFound)?;
    let tenant = Tenant::new(order.merchant_id);

    let update = CallbackUpdate {
        target: callback.target(),
        log_entry: callback.log_entry(received_at),
        notes: callback
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned),
    };

    let applied = store
        .apply_callback(tenant, order.id, &update)
        .await?
        .ok_or(FulfillmentError::OrderNotFound)?;

    if update.target.is_none()
        && let Some(word) = callback.external_status.as_deref()
    {
        tracing::warn!(order_id = %order.id, external_status = word, "Unknown external status");
    }
    if let Some(target) = update.target
        && applied.order.status != target
    {
        tracing::info!(
            order_id = %order.id,
            current = %applied.order.status,
            requested = %target,
            "Callback status not applicable, left unchanged"
        );
    }

    Ok(applied)
}

/// Notification counters for the last [`STATS_WINDOW_HOURS`].
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn notification_stats<S>(
    store: &S,
    tenant: Tenant,
    now: DateTime<Utc>,
) -> Result<NotificationStats, RepositoryError>
where
    S: OrderStore + ?Sized,
{
    store
        .notification_stats(tenant, now - Duration::hours(STATS_WINDOW_HOURS))
        .await
}
