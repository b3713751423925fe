//! End-to-end HTTP flows against the served router.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use live_commerce_core::Money;
use live_commerce_integration_tests::{
    CALLBACK_TOKEN, FakeBot, Options, PASSWORD, TestApp, seed_merchant, seed_product,
};
use live_commerce_server::db::CatalogStore;
use live_commerce_server::models::{Product, ProductInput};
use live_commerce_server::tenant::Tenant;

async fn body(resp: reqwest::Response) -> Value {
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn(Options::default()).await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = app.client.get(app.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_storefront_checkout() {
    let app = TestApp::spawn(Options::default()).await;
    let acme = seed_merchant(&app.store, "acme").await;
    let widget = seed_product(&app.store, acme.tenant, "Widget", 1000, 3).await;

    let resp = app.client.get(app.url("/stores/acme")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["slug"], "acme");

    let resp = app
        .client
        .get(app.url("/stores/acme/products"))
        .send()
        .await
        .unwrap();
    let products = body(resp).await;
    assert_eq!(products.as_array().unwrap().len(), 1);

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .json(&json!({
            "customer": { "phone": "+1 555 0100", "name": "Jane" },
            "items": [{ "productId": widget.id, "quantity": 2, "unitPriceAtAdd": "9.99" }],
            "paymentMethod": "cash"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed = body(resp).await;
    assert_eq!(placed["subtotal"], "20.00");
    assert_eq!(placed["status"], "pending");
    assert!(placed["orderCode"].as_str().unwrap().starts_with("LC-"));
    assert_eq!(app.store.stock_of(widget.id).await, Some(1));
}

#[tokio::test]
async fn test_storefront_errors() {
    let app = TestApp::spawn(Options::default()).await;
    let acme = seed_merchant(&app.store, "acme").await;
    let widget = seed_product(&app.store, acme.tenant, "Widget", 1000, 1).await;

    // Slugs are case-sensitive
    let resp = app.client.get(app.url("/stores/ACME")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .json(&json!({ "customer": { "phone": "+1 555 0100", "name": "Jane" }, "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = body(resp).await;
    assert_eq!(err["error"], "Validation failed");
    assert_eq!(err["details"][0]["field"], "items");

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .json(&json!({
            "customer": { "phone": "+1 555 0100", "name": "Jane" },
            "items": [{ "productId": widget.id, "quantity": 5 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = body(resp).await;
    assert_eq!(err["error"], "Insufficient stock");
    assert_eq!(err["details"][0]["available"], 1);
    assert_eq!(err["details"][0]["reason"], "insufficient_stock");

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.store.set_store_active(acme.merchant.id, false).await;
    let resp = app.client.get(app.url("/stores/acme")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idempotent_checkout_over_http() {
    let app = TestApp::spawn(Options::default()).await;
    let acme = seed_merchant(&app.store, "acme").await;
    let widget = seed_product(&app.store, acme.tenant, "Widget", 1000, 5).await;
    let order = json!({
        "customer": { "phone": "+1 555 0100", "name": "Jane" },
        "items": [{ "productId": widget.id, "quantity": 1 }]
    });

    let first = app
        .client
        .post(app.url("/stores/acme/orders"))
        .header("Idempotency-Key", "cart-42")
        .json(&order)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = body(first).await;

    let replay = app
        .client
        .post(app.url("/stores/acme/orders"))
        .header("Idempotency-Key", "cart-42")
        .json(&order)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::OK);
    assert_eq!(body(replay).await["orderId"], first["orderId"]);
    assert_eq!(app.store.stock_of(widget.id).await, Some(4));
}

#[tokio::test]
async fn test_admin_routes_require_login() {
    let app = TestApp::spawn(Options::default()).await;

    for path in ["/orders", "/products", "/dashboard", "/store/settings", "/auth/me"] {
        let resp = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(resp).await["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_register_login_and_manage_orders() {
    let app = TestApp::spawn(Options::default()).await;

    let resp = app
        .client
        .post(app.url("/merchants"))
        .json(&json!({
            "email": "Ana@Example.com",
            "password": PASSWORD,
            "name": "Ana",
            "storeName": "Ana Goods"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let registered = body(resp).await;
    assert_eq!(registered["store"]["slug"], "ana-goods");

    let resp = app
        .client
        .get(app.url("/merchants/check-slug/ana-goods"))
        .send()
        .await
        .unwrap();
    assert_eq!(body(resp).await["available"], false);

    // Registration logs the merchant in
    let resp = app.client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["merchant"]["email"], "ana@example.com");

    let resp = app
        .client
        .post(app.url("/products"))
        .json(&json!({ "name": "Mug", "price": "12.50", "stock": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product_id = body(resp).await["id"].clone();

    let resp = app
        .client
        .post(app.url("/orders"))
        .json(&json!({
            "customer": { "phone": "555 0100", "name": "Walk-in" },
            "items": [{ "productId": product_id, "quantity": 2 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order_id = body(resp).await["orderId"].as_i64().unwrap();

    let resp = app
        .client
        .put(app.url(&format!("/orders/{order_id}/status")))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["status"], "confirmed");

    let resp = app
        .client
        .put(app.url(&format!("/orders/{order_id}/status")))
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .client
        .put(app.url(&format!("/orders/{order_id}/status")))
        .json(&json!({ "status": "lost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .client
        .get(app.url("/orders?status=confirmed"))
        .send()
        .await
        .unwrap();
    assert_eq!(body(resp).await.as_array().unwrap().len(), 1);

    let resp = app.client.get(app.url("/dashboard")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let dash = body(resp).await;
    assert_eq!(dash["totalPedidos"], 1);
    assert_eq!(dash["totalVentas"], "25.00");
    assert_eq!(dash["ventasPorDia"].as_array().unwrap().len(), 7);

    let resp = app
        .client
        .delete(app.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["status"], "cancelled");

    let resp = app.client.post(app.url("/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.client.get(app.url("/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cannot_reach_other_tenant_orders() {
    let app = TestApp::spawn(Options::default()).await;
    let acme = seed_merchant(&app.store, "acme").await;
    let other = seed_merchant(&app.store, "other-shop").await;
    let widget = seed_product(&app.store, acme.tenant, "Widget", 1000, 3).await;

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .json(&json!({
            "customer": { "phone": "+1 555 0100", "name": "Jane" },
            "items": [{ "productId": widget.id, "quantity": 1 }]
        }))
        .send()
        .await
        .unwrap();
    let order_id = body(resp).await["orderId"].as_i64().unwrap();

    app.login(&other).await;
    let resp = app
        .client
        .get(app.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .put(app.url(&format!("/products/{}", widget.id)))
        .json(&json!({ "name": "Stolen", "price": "1.00", "stock": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.client.get(app.url("/orders")).send().await.unwrap();
    assert!(body(resp).await.as_array().unwrap().is_empty());
}

async fn catalog_product(
    app: &TestApp,
    tenant: Tenant,
    name: &str,
    description: Option<&str>,
    category: Option<&str>,
) -> Product {
    let input = ProductInput {
        name: name.to_owned(),
        description: description.map(str::to_owned),
        price: Money::from_cents(500),
        stock: 5,
        category: category.map(str::to_owned),
        image_url: None,
        active: true,
    };
    app.store.create_product(tenant, &input).await.unwrap()
}

fn names(products: &Value) -> Vec<&str> {
    let mut names: Vec<&str> = products
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    names
}

#[tokio::test]
async fn test_catalog_filters_and_product_detail() {
    let app = TestApp::spawn(Options::default()).await;
    let acme = seed_merchant(&app.store, "acme").await;
    let other = seed_merchant(&app.store, "other-shop").await;
    let shirt = catalog_product(
        &app,
        acme.tenant,
        "Linen Shirt",
        Some("Breathable summer wear"),
        Some("Clothing"),
    )
    .await;
    catalog_product(&app, acme.tenant, "Wool Scarf", None, Some("clothing")).await;
    let mug = catalog_product(&app, acme.tenant, "Summer Mug", None, Some("Kitchen")).await;
    let foreign = catalog_product(&app, other.tenant, "Summer Hat", None, Some("Clothing")).await;
    assert!(app.store.deactivate_product(acme.tenant, mug.id).await.unwrap());

    let resp = app
        .client
        .get(app.url("/stores/acme/products?category=CLOTHING"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(names(&body(resp).await), vec!["Linen Shirt", "Wool Scarf"]);

    // Search covers name and description; inactive and foreign products stay hidden
    let resp = app
        .client
        .get(app.url("/stores/acme/products?q=summer"))
        .send()
        .await
        .unwrap();
    assert_eq!(names(&body(resp).await), vec!["Linen Shirt"]);

    let resp = app
        .client
        .get(app.url(&format!("/stores/acme/products/{}", shirt.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["category"], "Clothing");

    for id in [mug.id, foreign.id] {
        let resp = app
            .client
            .get(app.url(&format!("/stores/acme/products/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // The admin sees inactive products, but never another tenant's
    app.login(&acme).await;
    let resp = app
        .client
        .get(app.url("/products?q=SUMMER"))
        .send()
        .await
        .unwrap();
    assert_eq!(names(&body(resp).await), vec!["Linen Shirt", "Summer Mug"]);

    let resp = app
        .client
        .get(app.url(&format!("/products/{}", mug.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["active"], false);

    let resp = app
        .client
        .get(app.url(&format!("/products/{}", foreign.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_edits_order_notes() {
    let app = TestApp::spawn(Options::default()).await;
    let acme = seed_merchant(&app.store, "acme").await;
    let other = seed_merchant(&app.store, "other-shop").await;
    let widget = seed_product(&app.store, acme.tenant, "Widget", 1000, 3).await;

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .json(&json!({
            "customer": { "phone": "+1 555 0100", "name": "Jane" },
            "items": [{ "productId": widget.id, "quantity": 1 }],
            "notes": "ring twice"
        }))
        .send()
        .await
        .unwrap();
    let order_id = body(resp).await["orderId"].as_i64().unwrap();
    let url = app.url(&format!("/orders/{order_id}"));

    app.login(&other).await;
    let resp = app
        .client
        .put(&url)
        .json(&json!({ "notes": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    app.login(&acme).await;
    let resp = app
        .client
        .put(&url)
        .json(&json!({ "status": "confirmed", "notes": "leave at door" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let order = body(resp).await;
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["notes"], "leave at door");

    // A rejected transition writes nothing
    let resp = app
        .client
        .put(&url)
        .json(&json!({ "status": "pending", "notes": "lost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app.client.put(&url).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .client
        .put(&url)
        .json(&json!({ "notes": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let order = body(resp).await;
    assert_eq!(order["status"], "confirmed");
    assert!(order["notes"].is_null());
}

#[tokio::test]
async fn test_fulfillment_callback_and_resend_over_http() {
    let bot = FakeBot::start().await;
    let app = TestApp::spawn(Options {
        webhook_url: Some(bot.url.clone()),
        callback_token: Some(CALLBACK_TOKEN.to_owned()),
        ..Options::default()
    })
    .await;
    let acme = seed_merchant(&app.store, "acme").await;
    let widget = seed_product(&app.store, acme.tenant, "Widget", 1000, 3).await;

    let resp = app
        .client
        .post(app.url("/stores/acme/orders"))
        .json(&json!({
            "customer": { "phone": "+1 555 0100", "name": "Jane" },
            "items": [{ "productId": widget.id, "quantity": 1 }]
        }))
        .send()
        .await
        .unwrap();
    let placed = body(resp).await;
    let code = placed["orderCode"].as_str().unwrap().to_owned();

    let callback = json!({ "orderIdOrCode": code, "customerConfirmed": true });

    let resp = app
        .client
        .post(app.url("/fulfillment/callback"))
        .json(&callback)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .client
        .post(app.url("/fulfillment/callback"))
        .bearer_auth("wrong-token")
        .json(&callback)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .client
        .post(app.url("/fulfillment/callback"))
        .bearer_auth(CALLBACK_TOKEN)
        .json(&callback)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let applied = body(resp).await;
    assert_eq!(applied["previousStatus"], "pending");
    assert_eq!(applied["newStatus"], "confirmed");

    let resp = app
        .client
        .post(app.url("/fulfillment/callback"))
        .bearer_auth(CALLBACK_TOKEN)
        .json(&json!({ "orderIdOrCode": "LC-20990101-0000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    app.login(&acme).await;
    let resp = app
        .client
        .post(app.url(&format!("/fulfillment/resend/{}", placed["orderId"])))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["notificationStatus"], "sent");
    assert!(bot.received().iter().any(|p| p["event"] == "order.resent"));

    let resp = app
        .client
        .get(app.url("/fulfillment/status"))
        .send()
        .await
        .unwrap();
    let status = body(resp).await;
    assert_eq!(status["enabled"], true);
    assert_eq!(status["windowHours"], 24);
    assert_eq!(status["total"], 1);
    assert_eq!(status["confirmed"], 1);
}
