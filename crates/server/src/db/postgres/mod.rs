//! `PostgreSQL` implementation of the store traits.

pub mod merchants;
pub mod orders;
pub mod products;
pub mod reports;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use live_commerce_core::{Email, MerchantId, OrderCode, OrderId, OrderStatus, ProductId, Slug};

pub use merchants::MerchantRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reports::ReportRepository;

use super::{CatalogStore, OrderStore, ReportStore, RepositoryError, Store};
use crate::models::{
    CallbackApplied, CallbackUpdate, DailySales, DashboardTotals, InsertOrderError, Merchant,
    MerchantCredentials, NewMerchant, NewOrder, NotificationOutcome, NotificationStats, Order,
    OrderFilter, OrderReference, Product, ProductFilter, ProductInput, StoreSettings, Storefront,
    TopProduct, TransitionOutcome,
};
use crate::tenant::Tenant;

/// Store backed by a shared `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn merchant_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<MerchantCredentials>, RepositoryError> {
        MerchantRepository::new(&self.pool).get_credentials(email).await
    }

    async fn merchant(&self, id: MerchantId) -> Result<Option<Merchant>, RepositoryError> {
        MerchantRepository::new(&self.pool).get_by_id(id).await
    }

    async fn slug_taken(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        MerchantRepository::new(&self.pool).slug_taken(slug).await
    }

    async fn create_merchant(
        &self,
        new: &NewMerchant,
    ) -> Result<(Merchant, Storefront), RepositoryError> {
        MerchantRepository::new(&self.pool).create(new).await
    }

    async fn storefront_by_slug(&self, slug: &Slug) -> Result<Option<Storefront>, RepositoryError> {
        MerchantRepository::new(&self.pool)
            .storefront_by_slug(slug)
            .await
    }

    async fn storefront(&self, tenant: Tenant) -> Result<Option<Storefront>, RepositoryError> {
        MerchantRepository::new(&self.pool).storefront(tenant).await
    }

    async fn update_store_settings(
        &self,
        tenant: Tenant,
        settings: &StoreSettings,
    ) -> Result<Option<Storefront>, RepositoryError> {
        MerchantRepository::new(&self.pool)
            .update_settings(tenant, settings)
            .await
    }

    async fn list_products(
        &self,
        tenant: Tenant,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).list(tenant, filter).await
    }

    async fn product(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get(tenant, id).await
    }

    async fn products_by_ids(
        &self,
        tenant: Tenant,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get_many(tenant, ids).await
    }

    async fn create_product(
        &self,
        tenant: Tenant,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        ProductRepository::new(&self.pool).create(tenant, input).await
    }

    async fn update_product(
        &self,
        tenant: Tenant,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool)
            .update(tenant, id, input)
            .await
    }

    async fn deactivate_product(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<bool, RepositoryError> {
        ProductRepository::new(&self.pool).deactivate(tenant, id).await
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn code_exists(&self, code: &OrderCode) -> Result<bool, RepositoryError> {
        OrderRepository::new(&self.pool).code_exists(code).await
    }

    async fn order_by_idempotency_key(
        &self,
        tenant: Tenant,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .get_by_idempotency_key(tenant, key)
            .await
    }

    async fn insert_order(
        &self,
        tenant: Tenant,
        order: &NewOrder,
    ) -> Result<Order, InsertOrderError> {
        OrderRepository::new(&self.pool).insert(tenant, order).await
    }

    async fn order(&self, tenant: Tenant, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get(tenant, id).await
    }

    async fn order_by_reference(
        &self,
        reference: &OrderReference,
    ) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .get_by_reference(reference)
            .await
    }

    async fn list_orders(
        &self,
        tenant: Tenant,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).list(tenant, filter).await
    }

    async fn transition_status(
        &self,
        tenant: Tenant,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .transition_status(tenant, id, next)
            .await
    }

    async fn set_order_notes(
        &self,
        tenant: Tenant,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .set_notes(tenant, id, notes)
            .await
    }

    async fn record_notification(
        &self,
        tenant: Tenant,
        id: OrderId,
        outcome: &NotificationOutcome,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(&self.pool)
            .record_notification(tenant, id, outcome)
            .await
    }

    async fn apply_callback(
        &self,
        tenant: Tenant,
        id: OrderId,
        update: &CallbackUpdate,
    ) -> Result<Option<CallbackApplied>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .apply_callback(tenant, id, update)
            .await
    }

    async fn notification_stats(
        &self,
        tenant: Tenant,
        since: DateTime<Utc>,
    ) -> Result<NotificationStats, RepositoryError> {
        OrderRepository::new(&self.pool)
            .notification_stats(tenant, since)
            .await
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn dashboard_totals(&self, tenant: Tenant) -> Result<DashboardTotals, RepositoryError> {
        ReportRepository::new(&self.pool).totals(tenant).await
    }

    async fn top_products(
        &self,
        tenant: Tenant,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        ReportRepository::new(&self.pool)
            .top_products(tenant, limit)
            .await
    }

    async fn daily_sales(
        &self,
        tenant: Tenant,
        since: NaiveDate,
    ) -> Result<Vec<DailySales>, RepositoryError> {
        ReportRepository::new(&self.pool)
            .daily_sales(tenant, since)
            .await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
