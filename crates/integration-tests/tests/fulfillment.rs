//! Fulfillment bot notifications, manual resend and inbound callbacks.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use live_commerce_core::{NotificationStatus, OrderStatus, Phone, ProductId};
use live_commerce_integration_tests::{
    FakeBot, Options, Seeded, build_state, seed_merchant, seed_product, unreachable_url,
};
use live_commerce_server::db::memory::MemoryStore;
use live_commerce_server::models::order::NOTES_SEPARATOR;
use live_commerce_server::models::{Customer, NotificationOutcome, Order, OrderReference};
use live_commerce_server::services::fulfillment::{self, Callback};
use live_commerce_server::services::{FulfillmentError, LineRequest, OrderDraft};
use live_commerce_server::state::AppState;

fn draft(product_id: ProductId, notes: Option<&str>) -> OrderDraft {
    OrderDraft {
        customer: Customer {
            phone: Phone::parse("+1 555 0100").unwrap(),
            name: "Jane".to_owned(),
            email: None,
            address: None,
        },
        lines: vec![LineRequest {
            product_id,
            quantity: 1,
            price_hint: None,
        }],
        payment_method: None,
        notes: notes.map(str::to_owned),
        idempotency_key: None,
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    state: AppState,
    acme: Seeded,
    product: ProductId,
}

async fn fixture(options: Options) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let acme = seed_merchant(&store, "acme").await;
    let product = seed_product(&store, acme.tenant, "Widget", 1000, 50).await.id;
    let state = build_state(Arc::clone(&store), options);
    Fixture {
        store,
        state,
        acme,
        product,
    }
}

impl Fixture {
    /// Place an order and wait for its notification to settle.
    async fn place(&self, notes: Option<&str>) -> (Order, NotificationOutcome) {
        let placed = self
            .state
            .orders()
            .place(self.acme.tenant, draft(self.product, notes))
            .await
            .unwrap();
        let outcome = placed.notification.unwrap().await.unwrap();
        let order = self
            .state
            .orders()
            .get(self.acme.tenant, placed.order.id)
            .await
            .unwrap();
        (order, outcome)
    }

    async fn callback(&self, callback: &Callback) -> Result<Order, FulfillmentError> {
        fulfillment::apply_callback(self.state.store(), callback, Utc::now())
            .await
            .map(|applied| applied.order)
    }
}

fn callback(reference: OrderReference) -> Callback {
    Callback {
        reference,
        external_status: None,
        customer_reply: None,
        notes: None,
        customer_confirmed: false,
    }
}

#[tokio::test]
async fn test_new_order_is_pushed_to_bot() {
    let bot = FakeBot::start().await;
    let fx = fixture(Options {
        webhook_url: Some(bot.url.clone()),
        ..Options::default()
    })
    .await;

    let (order, outcome) = fx.place(Some("ring twice")).await;

    assert_eq!(outcome, NotificationOutcome::Sent);
    assert_eq!(order.notification.status, NotificationStatus::Sent);
    assert!(order.notification.notified_at.is_some());

    let received = bot.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "order.created");
    assert_eq!(received[0]["order"]["code"], order.code.as_str());
    assert_eq!(received[0]["order"]["total"], "10.00");
    assert_eq!(received[0]["order"]["notes"], "ring twice");
    assert_eq!(received[0]["order"]["items"][0]["quantity"], 1);
}

#[tokio::test]
async fn test_bot_failure_keeps_order_and_marks_failed() {
    let bot = FakeBot::start().await;
    bot.respond_with(500);
    let fx = fixture(Options {
        webhook_url: Some(bot.url.clone()),
        ..Options::default()
    })
    .await;

    let (order, outcome) = fx.place(None).await;

    assert!(matches!(outcome, NotificationOutcome::Failed(_)));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.notification.status, NotificationStatus::Failed);
    assert!(order.notification.error.is_some());
    assert_eq!(fx.store.order_count().await, 1);
}

#[tokio::test]
async fn test_unreachable_bot_marks_failed() {
    let fx = fixture(Options {
        webhook_url: Some(unreachable_url()),
        ..Options::default()
    })
    .await;

    let (order, outcome) = fx.place(None).await;

    assert!(matches!(outcome, NotificationOutcome::Failed(_)));
    assert_eq!(order.notification.status, NotificationStatus::Failed);
}

#[tokio::test]
async fn test_resend_recovers_failed_notification() {
    let bot = FakeBot::start().await;
    bot.respond_with(503);
    let fx = fixture(Options {
        webhook_url: Some(bot.url.clone()),
        ..Options::default()
    })
    .await;
    let (order, _) = fx.place(None).await;

    // Still failing: the error is surfaced and the state stays failed
    let err = fx
        .state
        .notifier()
        .resend(fx.state.store(), fx.acme.tenant, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::Delivery(_)));

    bot.respond_with(200);
    let resent = fx
        .state
        .notifier()
        .resend(fx.state.store(), fx.acme.tenant, order.id)
        .await
        .unwrap();
    assert_eq!(resent.notification.status, NotificationStatus::Sent);
    assert!(resent.notification.error.is_none());

    let received = bot.received();
    assert_eq!(received.len(), 3);
    assert_eq!(received[2]["event"], "order.resent");

    // A later failure never downgrades a sent order
    bot.respond_with(500);
    assert!(
        fx.state
            .notifier()
            .resend(fx.state.store(), fx.acme.tenant, order.id)
            .await
            .is_err()
    );
    let order = fx.state.orders().get(fx.acme.tenant, order.id).await.unwrap();
    assert_eq!(order.notification.status, NotificationStatus::Sent);
}

#[tokio::test]
async fn test_resend_requires_endpoint_and_own_order() {
    let fx = fixture(Options::default()).await;
    let (order, outcome) = fx.place(None).await;
    assert_eq!(outcome, NotificationOutcome::Disabled);

    let err = fx
        .state
        .notifier()
        .resend(fx.state.store(), fx.acme.tenant, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::Disabled));

    let bot = FakeBot::start().await;
    let other = seed_merchant(&fx.store, "other-shop").await;
    let with_bot = build_state(
        Arc::clone(&fx.store),
        Options {
            webhook_url: Some(bot.url.clone()),
            ..Options::default()
        },
    );
    let err = with_bot
        .notifier()
        .resend(with_bot.store(), other.tenant, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::OrderNotFound));
    assert!(bot.received().is_empty());
}

#[tokio::test]
async fn test_callback_customer_confirmation() {
    let fx = fixture(Options::default()).await;
    let (order, _) = fx.place(None).await;

    let mut confirm = callback(OrderReference::Code(order.code.to_string()));
    confirm.external_status = Some("contacted".to_owned());
    confirm.customer_reply = Some("yes please".to_owned());
    confirm.customer_confirmed = true;
    let updated = fx.callback(&confirm).await.unwrap();

    assert_eq!(updated.status, OrderStatus::Confirmed);
    assert_eq!(updated.fulfillment_log.len(), 1);
    assert_eq!(updated.fulfillment_log[0]["customerReply"], "yes please");
    assert_eq!(updated.fulfillment_log[0]["customerConfirmed"], true);
}

#[tokio::test]
async fn test_callback_maps_external_vocabulary() {
    let fx = fixture(Options::default()).await;
    let (order, _) = fx.place(None).await;

    let mut reject = callback(OrderReference::Id(order.id));
    reject.external_status = Some("rechazado".to_owned());
    let updated = fx.callback(&reject).await.unwrap();
    assert_eq!(updated.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_callback_unknown_or_illegal_status_is_logged_only() {
    let fx = fixture(Options::default()).await;
    let (order, _) = fx.place(None).await;

    let mut unknown = callback(OrderReference::Id(order.id));
    unknown.external_status = Some("typing".to_owned());
    let updated = fx.callback(&unknown).await.unwrap();
    assert_eq!(updated.status, OrderStatus::Pending);
    assert_eq!(updated.fulfillment_log.len(), 1);

    fx.state
        .orders()
        .change_status(fx.acme.tenant, order.id, OrderStatus::Shipped)
        .await
        .unwrap();

    // Shipped orders cannot go back to confirmed
    let mut late = callback(OrderReference::Id(order.id));
    late.customer_confirmed = true;
    let updated = fx.callback(&late).await.unwrap();
    assert_eq!(updated.status, OrderStatus::Shipped);
    assert_eq!(updated.fulfillment_log.len(), 2);
}

#[tokio::test]
async fn test_callback_notes_are_appended() {
    let fx = fixture(Options::default()).await;
    let (order, _) = fx.place(Some("leave at door")).await;

    let mut first = callback(OrderReference::Id(order.id));
    first.notes = Some("customer asked for red".to_owned());
    fx.callback(&first).await.unwrap();

    let mut blank = callback(OrderReference::Id(order.id));
    blank.notes = Some("   ".to_owned());
    let updated = fx.callback(&blank).await.unwrap();

    assert_eq!(
        updated.notes.as_deref(),
        Some(format!("leave at door{NOTES_SEPARATOR}customer asked for red").as_str())
    );
}

#[tokio::test]
async fn test_callback_numeric_string_tries_id_then_code() {
    let fx = fixture(Options::default()).await;
    let (order, _) = fx.place(None).await;

    let by_id = callback(OrderReference::Ambiguous(order.id, order.id.to_string()));
    assert_eq!(fx.callback(&by_id).await.unwrap().id, order.id);

    let unknown = callback(OrderReference::Code("LC-20990101-0000".to_owned()));
    assert!(matches!(
        fx.callback(&unknown).await,
        Err(FulfillmentError::OrderNotFound)
    ));
}

#[tokio::test]
async fn test_notification_stats_cover_last_day() {
    let bot = FakeBot::start().await;
    let fx = fixture(Options {
        webhook_url: Some(bot.url.clone()),
        ..Options::default()
    })
    .await;

    let (sent, _) = fx.place(None).await;
    bot.respond_with(500);
    let (failed, _) = fx.place(None).await;
    let (old, _) = fx.place(None).await;
    fx.store
        .backdate_order(old.id, Utc::now() - Duration::hours(30))
        .await;

    let mut confirm = callback(OrderReference::Id(sent.id));
    confirm.customer_confirmed = true;
    confirm.customer_reply = Some("ok".to_owned());
    fx.callback(&confirm).await.unwrap();
    let mut reject = callback(OrderReference::Id(failed.id));
    reject.external_status = Some("rejected".to_owned());
    fx.callback(&reject).await.unwrap();

    let stats = fulfillment::notification_stats(fx.state.store(), fx.acme.tenant, Utc::now())
        .await
        .unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.with_response, 2);
    assert_eq!(stats.confirmed, 1);
    assert_eq!(stats.cancelled, 1);
}
