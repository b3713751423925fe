//! Persistence layer.
//!
//! # Tables
//!
//! - `merchants` - Merchant accounts and login credentials
//! - `stores` - One storefront per merchant (slug, branding, shipping)
//! - `products` - Tenant-owned catalog with `stock >= 0` enforced
//! - `orders` - Order headers with JSON line snapshot and fulfillment log
//! - `order_items` - Normalized order lines for reporting joins
//!
//! # Tenancy
//!
//! Every catalog, order and report operation takes a [`Tenant`] and filters
//! on it in the query itself. A row owned by another tenant is
//! indistinguishable from a missing row.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p live-commerce-cli -- migrate
//! ```

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use live_commerce_core::{Email, MerchantId, OrderCode, OrderId, OrderStatus, ProductId, Slug};

use crate::models::{
    CallbackApplied, CallbackUpdate, DailySales, DashboardTotals, InsertOrderError, Merchant,
    MerchantCredentials, NewMerchant, NewOrder, NotificationOutcome, NotificationStats, Order,
    OrderFilter, OrderReference, Product, ProductFilter, ProductInput, StoreSettings, Storefront,
    TopProduct, TransitionOutcome,
};
use crate::tenant::Tenant;

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Merchant accounts, storefronts and products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up an active merchant and its password hash by login email.
    async fn merchant_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<MerchantCredentials>, RepositoryError>;

    /// Fetch a merchant by id, active or not.
    async fn merchant(&self, id: MerchantId) -> Result<Option<Merchant>, RepositoryError>;

    /// Whether a merchant or store already uses the slug.
    async fn slug_taken(&self, slug: &Slug) -> Result<bool, RepositoryError>;

    /// Create a merchant and its store atomically.
    ///
    /// Returns `Conflict` when the email or slug is taken.
    async fn create_merchant(
        &self,
        new: &NewMerchant,
    ) -> Result<(Merchant, Storefront), RepositoryError>;

    /// Resolve a public storefront. Both merchant and store must be active.
    async fn storefront_by_slug(&self, slug: &Slug) -> Result<Option<Storefront>, RepositoryError>;

    /// The tenant's own storefront, active or not.
    async fn storefront(&self, tenant: Tenant) -> Result<Option<Storefront>, RepositoryError>;

    /// Update merchant-editable store settings.
    async fn update_store_settings(
        &self,
        tenant: Tenant,
        settings: &StoreSettings,
    ) -> Result<Option<Storefront>, RepositoryError>;

    /// List products matching `filter`, newest first.
    async fn list_products(
        &self,
        tenant: Tenant,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Fetch one product.
    async fn product(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Fetch the tenant's products among `ids`, active or not. Missing ids
    /// are simply absent from the result.
    async fn products_by_ids(
        &self,
        tenant: Tenant,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Create a product.
    async fn create_product(
        &self,
        tenant: Tenant,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError>;

    /// Replace a product's fields.
    async fn update_product(
        &self,
        tenant: Tenant,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Soft delete. Returns `false` when the product is not the tenant's.
    async fn deactivate_product(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<bool, RepositoryError>;
}

/// Orders, stock reservation and fulfillment state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Whether any order, of any tenant, already uses the code.
    async fn code_exists(&self, code: &OrderCode) -> Result<bool, RepositoryError>;

    /// Find an order previously placed with the same idempotency key.
    async fn order_by_idempotency_key(
        &self,
        tenant: Tenant,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Insert the order, its lines and the stock decrements as one
    /// transaction. Decrements run in ascending product id order and each
    /// one only applies when enough stock remains.
    async fn insert_order(&self, tenant: Tenant, order: &NewOrder)
    -> Result<Order, InsertOrderError>;

    /// Fetch one order.
    async fn order(&self, tenant: Tenant, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Find an order for the fulfillment bot, which does not know tenants.
    async fn order_by_reference(
        &self,
        reference: &OrderReference,
    ) -> Result<Option<Order>, RepositoryError>;

    /// List orders, newest first.
    async fn list_orders(
        &self,
        tenant: Tenant,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Move an order to `next` if the lifecycle allows it. The check and
    /// the write happen under a row lock.
    async fn transition_status(
        &self,
        tenant: Tenant,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, RepositoryError>;

    /// Replace an order's notes. `None` clears them.
    async fn set_order_notes(
        &self,
        tenant: Tenant,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Record a notification attempt. A `Sent` order is never downgraded.
    async fn record_notification(
        &self,
        tenant: Tenant,
        id: OrderId,
        outcome: &NotificationOutcome,
    ) -> Result<(), RepositoryError>;

    /// Apply a bot callback: append the log entry and notes, and change the
    /// status when the lifecycle allows it.
    async fn apply_callback(
        &self,
        tenant: Tenant,
        id: OrderId,
        update: &CallbackUpdate,
    ) -> Result<Option<CallbackApplied>, RepositoryError>;

    /// Notification counters for orders created since `since`.
    async fn notification_stats(
        &self,
        tenant: Tenant,
        since: DateTime<Utc>,
    ) -> Result<NotificationStats, RepositoryError>;
}

/// Read-only aggregates for the dashboard.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Scalar counters.
    async fn dashboard_totals(&self, tenant: Tenant) -> Result<DashboardTotals, RepositoryError>;

    /// Products by units sold on orders that are not cancelled.
    async fn top_products(
        &self,
        tenant: Tenant,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError>;

    /// Revenue per UTC day since `since` (inclusive). Days without sales
    /// may be missing.
    async fn daily_sales(
        &self,
        tenant: Tenant,
        since: NaiveDate,
    ) -> Result<Vec<DailySales>, RepositoryError>;
}

/// The full persistence surface used by the services.
#[async_trait]
pub trait Store: CatalogStore + OrderStore + ReportStore {
    /// Cheap connectivity check for the readiness endpoint.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
