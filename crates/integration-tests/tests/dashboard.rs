//! Merchant dashboard aggregates.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use live_commerce_core::{OrderStatus, Phone, ProductId};
use live_commerce_integration_tests::{Options, build_state, seed_merchant, seed_product};
use live_commerce_server::db::memory::MemoryStore;
use live_commerce_server::models::{Customer, Order};
use live_commerce_server::services::dashboard;
use live_commerce_server::services::{LineRequest, OrderDraft};
use live_commerce_server::state::AppState;
use live_commerce_server::tenant::Tenant;
use rust_decimal::Decimal;

async fn place(state: &AppState, tenant: Tenant, lines: &[(ProductId, u32)]) -> Order {
    let draft = OrderDraft {
        customer: Customer {
            phone: Phone::parse("555 0100").unwrap(),
            name: "Jane".to_owned(),
            email: None,
            address: None,
        },
        lines: lines
            .iter()
            .map(|&(product_id, quantity)| LineRequest {
                product_id,
                quantity,
                price_hint: None,
            })
            .collect(),
        payment_method: None,
        notes: None,
        idempotency_key: None,
    };
    state.orders().place(tenant, draft).await.unwrap().order
}

#[tokio::test]
async fn test_empty_store_dashboard_is_zeroed() {
    let store = Arc::new(MemoryStore::new());
    let acme = seed_merchant(&store, "acme").await;
    let today = Utc::now().date_naive();

    let dash = dashboard::build(store.as_ref(), acme.tenant, today)
        .await
        .unwrap();

    assert_eq!(dash.total_orders, 0);
    assert_eq!(dash.total_revenue, Decimal::ZERO);
    assert_eq!(dash.active_products, 0);
    assert!(dash.top_products.is_empty());
    assert_eq!(dash.daily_sales.len(), 7);
    assert!(dash.daily_sales.iter().all(|d| d.revenue.is_zero()));
    assert_eq!(dash.daily_sales.last().unwrap().date, today);
}

#[tokio::test]
async fn test_cancelled_orders_excluded_from_revenue() {
    let store = Arc::new(MemoryStore::new());
    let acme = seed_merchant(&store, "acme").await;
    let widget = seed_product(&store, acme.tenant, "Widget", 1000, 10).await;
    let gadget = seed_product(&store, acme.tenant, "Gadget", 2500, 10).await;
    let state = build_state(Arc::clone(&store), Options::default());

    let confirmed = place(&state, acme.tenant, &[(widget.id, 2)]).await;
    state
        .orders()
        .change_status(acme.tenant, confirmed.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    let cancelled = place(&state, acme.tenant, &[(gadget.id, 2)]).await;
    state.orders().cancel(acme.tenant, cancelled.id).await.unwrap();

    let today = Utc::now().date_naive();
    let dash = dashboard::build(state.store(), acme.tenant, today)
        .await
        .unwrap();

    assert_eq!(dash.total_orders, 1);
    assert_eq!(dash.total_revenue, Decimal::new(2000, 2));
    assert_eq!(dash.pending_orders, 0);
    assert_eq!(dash.cancelled_orders, 1);
    assert_eq!(dash.active_products, 2);
    assert_eq!(dash.top_products.len(), 1);
    assert_eq!(dash.top_products[0].product_id, widget.id);
    assert_eq!(dash.top_products[0].units_sold, 2);
    assert_eq!(dash.daily_sales.last().unwrap().revenue, Decimal::new(2000, 2));

    let json = serde_json::to_value(&dash).unwrap();
    assert_eq!(json["totalVentas"], "20.00");
    assert_eq!(json["pedidosCancelados"], 1);
    assert_eq!(json["topProductos"][0]["nombre"], "Widget");
}

#[tokio::test]
async fn test_sales_series_and_top_products_ordering() {
    let store = Arc::new(MemoryStore::new());
    let acme = seed_merchant(&store, "acme").await;
    let other = seed_merchant(&store, "other-shop").await;
    let a = seed_product(&store, acme.tenant, "A", 100, 100).await;
    let b = seed_product(&store, acme.tenant, "B", 100, 100).await;
    let c = seed_product(&store, acme.tenant, "C", 100, 100).await;
    let foreign = seed_product(&store, other.tenant, "Foreign", 100, 100).await;
    let state = build_state(Arc::clone(&store), Options::default());

    place(&state, acme.tenant, &[(a.id, 1), (b.id, 3)]).await;
    let old = place(&state, acme.tenant, &[(c.id, 3)]).await;
    let ancient = place(&state, acme.tenant, &[(a.id, 1)]).await;
    place(&state, other.tenant, &[(foreign.id, 50)]).await;

    let now = Utc::now();
    store.backdate_order(old.id, now - Duration::days(2)).await;
    store.backdate_order(ancient.id, now - Duration::days(30)).await;

    let dash = dashboard::build(state.store(), acme.tenant, now.date_naive())
        .await
        .unwrap();

    // B and C tie on units; the lower id wins
    let top: Vec<_> = dash
        .top_products
        .iter()
        .map(|p| (p.product_id, p.units_sold))
        .collect();
    assert_eq!(top, vec![(b.id, 3), (c.id, 3), (a.id, 2)]);

    // All-time totals, windowed series
    assert_eq!(dash.total_orders, 3);
    assert_eq!(dash.total_revenue, Decimal::new(800, 2));
    let series: Vec<_> = dash.daily_sales.iter().map(|d| d.revenue).collect();
    assert_eq!(series.len(), 7);
    assert_eq!(series[4], Decimal::new(300, 2));
    assert_eq!(series[6], Decimal::new(400, 2));
    assert_eq!(series.iter().copied().sum::<Decimal>(), Decimal::new(700, 2));
}
