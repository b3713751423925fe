//! Integration tests for Live Commerce.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p live-commerce-integration-tests
//! ```
//!
//! Most tests run against the in-process [`MemoryStore`], so no database is
//! needed. The `postgres_store` tests exercise `PgStore` and are ignored
//! unless asked for with `DATABASE_URL` set:
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p live-commerce-integration-tests \
//!     --test postgres_store -- --ignored
//! ```
//!
//! HTTP tests serve the real router on an ephemeral port and talk to
//! it with `reqwest`. The fulfillment bot is replaced by [`FakeBot`], a tiny
//! axum server that records every payload it receives.
//!
//! # Test Categories
//!
//! - `order_placement` - Stock, codes, idempotency and tenant isolation
//! - `fulfillment` - Notifications, resend and bot callbacks
//! - `dashboard` - Merchant aggregates
//! - `http_api` - End-to-end HTTP flows with sessions
//! - `postgres_store` - Transactions, constraints and guards in `PostgreSQL`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use live_commerce_core::{Email, Money, Slug};
use live_commerce_server::config::FulfillmentConfig;
use live_commerce_server::db::memory::MemoryStore;
use live_commerce_server::db::{CatalogStore, Store};
use live_commerce_server::models::{Merchant, NewMerchant, Product, ProductInput, Storefront};
use live_commerce_server::services::{AuthService, FulfillmentNotifier, OrderCodeGenerator};
use live_commerce_server::state::AppState;
use live_commerce_server::tenant::Tenant;

/// Password given to every seeded merchant.
pub const PASSWORD: &str = "correct-horse-battery";

/// Token the fake bot presents on callbacks when one is configured.
pub const CALLBACK_TOKEN: &str = "kT9vQ2mX7pL4wZ8rN3bF6hJ1";

/// A seeded merchant with its storefront.
#[derive(Debug, Clone)]
pub struct Seeded {
    pub tenant: Tenant,
    pub merchant: Merchant,
    pub storefront: Storefront,
}

/// Register a merchant whose store slug and login email derive from `slug`.
pub async fn seed_merchant(store: &MemoryStore, slug: &str) -> Seeded {
    seed_merchant_in(store, slug).await
}

/// [`seed_merchant`] over any store.
pub async fn seed_merchant_in<S: CatalogStore + ?Sized>(store: &S, slug: &str) -> Seeded {
    let new = NewMerchant {
        email: Email::parse(&format!("owner@{slug}.test")).unwrap(),
        name: format!("Owner of {slug}"),
        phone: None,
        country: None,
        slug: Slug::parse(slug).unwrap(),
        password_hash: String::new(),
        store_name: format!("Store {slug}"),
        store_description: None,
        whatsapp: None,
    };
    let (merchant, storefront) = AuthService::new(store).register(new, PASSWORD).await.unwrap();
    Seeded {
        tenant: Tenant::new(merchant.id),
        merchant,
        storefront,
    }
}

/// Create an active product priced in cents.
pub async fn seed_product(
    store: &MemoryStore,
    tenant: Tenant,
    name: &str,
    price_cents: u32,
    stock: i32,
) -> Product {
    seed_product_in(store, tenant, name, price_cents, stock).await
}

/// [`seed_product`] over any store.
pub async fn seed_product_in<S: CatalogStore + ?Sized>(
    store: &S,
    tenant: Tenant,
    name: &str,
    price_cents: u32,
    stock: i32,
) -> Product {
    let input = ProductInput {
        name: name.to_owned(),
        description: None,
        price: Money::from_cents(price_cents),
        stock,
        category: None,
        image_url: None,
        active: true,
    };
    store.create_product(tenant, &input).await.unwrap()
}

/// Options for building test state.
#[derive(Debug, Default)]
pub struct Options {
    /// Endpoint for order notifications. `None` disables them.
    pub webhook_url: Option<Url>,
    /// Require this bearer token on callbacks.
    pub callback_token: Option<String>,
    /// Custom order code generator.
    pub codes: Option<OrderCodeGenerator>,
}

/// Build application state over `store`.
pub fn build_state(store: Arc<MemoryStore>, options: Options) -> AppState {
    build_state_over(store, options)
}

/// [`build_state`] over any store.
pub fn build_state_over(store: Arc<dyn Store>, options: Options) -> AppState {
    let config = FulfillmentConfig {
        webhook_url: options.webhook_url,
        timeout: Duration::from_secs(2),
        callback_token: options.callback_token.map(SecretString::from),
    };
    let notifier = FulfillmentNotifier::new(&config).unwrap();
    let codes = options
        .codes
        .unwrap_or_else(|| OrderCodeGenerator::new("LC").unwrap());
    AppState::new(store, codes, notifier, config.callback_token)
}

/// The real router served on an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    /// Client with a cookie jar, so logins persist across requests.
    pub client: reqwest::Client,
}

impl TestApp {
    /// Serve the app over a fresh store.
    pub async fn spawn(options: Options) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = build_state(Arc::clone(&store), options);
        let app = live_commerce_server::app(
            state.clone(),
            tower_sessions::MemoryStore::default(),
            false,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap();

        Self {
            addr,
            store,
            state,
            client,
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Log in as a seeded merchant.
    pub async fn login(&self, seeded: &Seeded) {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({
                "email": seeded.merchant.email.as_str(),
                "password": PASSWORD,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
    }
}

#[derive(Clone)]
struct BotState {
    received: Arc<Mutex<Vec<Value>>>,
    status: Arc<AtomicU16>,
}

/// Stand-in for the fulfillment bot.
///
/// Records every JSON payload and answers with a configurable status.
pub struct FakeBot {
    pub url: Url,
    state: BotState,
}

impl FakeBot {
    /// Start a bot that accepts every payload.
    pub async fn start() -> Self {
        let state = BotState {
            received: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(200)),
        };
        let app = Router::new()
            .route("/orders", post(receive))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{addr}/orders")).unwrap(),
            state,
        }
    }

    /// Answer subsequent payloads with `status`.
    pub fn respond_with(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    /// Payloads received so far.
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn receive(State(state): State<BotState>, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().unwrap().push(body);
    StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

/// A URL nothing listens on.
pub fn unreachable_url() -> Url {
    Url::parse("http://127.0.0.1:9/orders").unwrap()
}
