//! In-process store for tests.
//!
//! Every operation runs under one mutex, which gives the same atomicity the
//! `PostgreSQL` transactions provide: an order insert checks and decrements
//! all of its lines before anyone else can observe stock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use live_commerce_core::{
    Email, MerchantId, Money, NotificationStatus, OrderCode, OrderId, OrderStatus, ProductId,
    Slug, StoreId,
};

use super::{CatalogStore, OrderStore, ReportStore, RepositoryError, Store};
use crate::models::order::{NotificationState, append_notes};
use crate::models::{
    CallbackApplied, CallbackUpdate, DailySales, DashboardTotals, InsertOrderError, Merchant,
    MerchantCredentials, NewMerchant, NewOrder, NotificationOutcome, NotificationStats, Order,
    OrderFilter, OrderReference, Product, ProductFilter, ProductInput, StoreSettings, Storefront,
    TopProduct, TransitionOutcome,
};
use crate::tenant::Tenant;

#[derive(Default)]
struct State {
    merchants: Vec<(Merchant, String)>,
    stores: Vec<Storefront>,
    products: Vec<Product>,
    orders: Vec<(Order, Option<String>)>,
    next_id: i32,
    forced_code_collisions: usize,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn order_mut(&mut self, tenant: Tenant, id: OrderId) -> Option<&mut Order> {
        self.orders
            .iter_mut()
            .map(|(order, _)| order)
            .find(|o| o.id == id && o.merchant_id == tenant.merchant_id())
    }

    fn tenant_orders(&self, tenant: Tenant) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .map(|(order, _)| order)
            .filter(move |o| o.merchant_id == tenant.merchant_id())
    }
}

/// Mutex-guarded in-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` order inserts fail with a code collision, as if
    /// another request had claimed the code between check and insert.
    pub async fn force_code_collisions(&self, count: usize) {
        self.state.lock().await.forced_code_collisions = count;
    }

    /// Activate or deactivate a merchant.
    pub async fn set_merchant_active(&self, id: MerchantId, active: bool) {
        let mut state = self.state.lock().await;
        if let Some((merchant, _)) = state.merchants.iter_mut().find(|(m, _)| m.id == id) {
            merchant.active = active;
        }
    }

    /// Activate or deactivate a merchant's store.
    pub async fn set_store_active(&self, id: MerchantId, active: bool) {
        let mut state = self.state.lock().await;
        if let Some(store) = state.stores.iter_mut().find(|s| s.merchant_id == id) {
            store.active = active;
        }
    }

    /// Move an order's creation time, for time-window tests.
    pub async fn backdate_order(&self, id: OrderId, created_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some((order, _)) = state.orders.iter_mut().find(|(o, _)| o.id == id) {
            order.created_at = created_at;
        }
    }

    /// Current stock of a product, ignoring tenancy.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        let state = self.state.lock().await;
        state.products.iter().find(|p| p.id == id).map(|p| p.stock)
    }

    /// Number of orders across all tenants.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn merchant_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<MerchantCredentials>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .merchants
            .iter()
            .find(|(m, _)| &m.email == email && m.active)
            .map(|(merchant, hash)| MerchantCredentials {
                merchant: merchant.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn merchant(&self, id: MerchantId) -> Result<Option<Merchant>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .merchants
            .iter()
            .find(|(m, _)| m.id == id)
            .map(|(m, _)| m.clone()))
    }

    async fn slug_taken(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.merchants.iter().any(|(m, _)| &m.slug == slug)
            || state.stores.iter().any(|s| &s.slug == slug))
    }

    async fn create_merchant(
        &self,
        new: &NewMerchant,
    ) -> Result<(Merchant, Storefront), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.merchants.iter().any(|(m, _)| m.email == new.email) {
            return Err(RepositoryError::Conflict("email already registered".to_owned()));
        }
        if state.merchants.iter().any(|(m, _)| m.slug == new.slug)
            || state.stores.iter().any(|s| s.slug == new.slug)
        {
            return Err(RepositoryError::Conflict("slug already taken".to_owned()));
        }

        let merchant = Merchant {
            id: MerchantId::new(state.next_id()),
            email: new.email.clone(),
            name: new.name.clone(),
            phone: new.phone.clone(),
            slug: new.slug.clone(),
            country: new.country.clone(),
            active: true,
            created_at: Utc::now(),
        };
        let store = Storefront {
            store_id: StoreId::new(state.next_id()),
            merchant_id: merchant.id,
            slug: new.slug.clone(),
            name: new.store_name.clone(),
            description: new.store_description.clone(),
            logo_url: None,
            primary_color: None,
            secondary_color: None,
            whatsapp: new.whatsapp.as_ref().map(ToString::to_string),
            instagram: None,
            tiktok: None,
            shipping_cost: Money::ZERO,
            active: true,
        };
        state
            .merchants
            .push((merchant.clone(), new.password_hash.clone()));
        state.stores.push(store.clone());
        Ok((merchant, store))
    }

    async fn storefront_by_slug(&self, slug: &Slug) -> Result<Option<Storefront>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .stores
            .iter()
            .find(|s| &s.slug == slug && s.active)
            .filter(|s| {
                state
                    .merchants
                    .iter()
                    .any(|(m, _)| m.id == s.merchant_id && m.active)
            })
            .cloned())
    }

    async fn storefront(&self, tenant: Tenant) -> Result<Option<Storefront>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .stores
            .iter()
            .find(|s| s.merchant_id == tenant.merchant_id())
            .cloned())
    }

    async fn update_store_settings(
        &self,
        tenant: Tenant,
        settings: &StoreSettings,
    ) -> Result<Option<Storefront>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(store) = state
            .stores
            .iter_mut()
            .find(|s| s.merchant_id == tenant.merchant_id())
        else {
            return Ok(None);
        };
        store.name.clone_from(&settings.name);
        store.whatsapp = settings.whatsapp.as_ref().map(ToString::to_string);
        store.shipping_cost = settings.shipping_cost;
        Ok(Some(store.clone()))
    }

    async fn list_products(
        &self,
        tenant: Tenant,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.merchant_id == tenant.merchant_id() && filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }

    async fn product(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .iter()
            .find(|p| p.id == id && p.merchant_id == tenant.merchant_id())
            .cloned())
    }

    async fn products_by_ids(
        &self,
        tenant: Tenant,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.merchant_id == tenant.merchant_id() && ids.contains(&p.id))
            .cloned()
            .collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn create_product(
        &self,
        tenant: Tenant,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.next_id()),
            merchant_id: tenant.merchant_id(),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            stock: input.stock,
            category: input.category.clone(),
            image_url: input.image_url.clone(),
            active: input.active,
            created_at: now,
            updated_at: now,
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        tenant: Tenant,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(product) = state
            .products
            .iter_mut()
            .find(|p| p.id == id && p.merchant_id == tenant.merchant_id())
        else {
            return Ok(None);
        };
        product.name.clone_from(&input.name);
        product.description.clone_from(&input.description);
        product.price = input.price;
        product.stock = input.stock;
        product.category.clone_from(&input.category);
        product.image_url.clone_from(&input.image_url);
        product.active = input.active;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn deactivate_product(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state
            .products
            .iter_mut()
            .find(|p| p.id == id && p.merchant_id == tenant.merchant_id())
        {
            Some(product) => {
                product.active = false;
                product.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn code_exists(&self, code: &OrderCode) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().any(|(o, _)| &o.code == code))
    }

    async fn order_by_idempotency_key(
        &self,
        tenant: Tenant,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|(o, k)| o.merchant_id == tenant.merchant_id() && k.as_deref() == Some(key))
            .map(|(o, _)| o.clone()))
    }

    async fn insert_order(
        &self,
        tenant: Tenant,
        order: &NewOrder,
    ) -> Result<Order, InsertOrderError> {
        let mut state = self.state.lock().await;

        if state.forced_code_collisions > 0 {
            state.forced_code_collisions -= 1;
            return Err(InsertOrderError::CodeTaken);
        }
        if state.orders.iter().any(|(o, _)| o.code == order.code) {
            return Err(InsertOrderError::CodeTaken);
        }
        if let Some(key) = order.idempotency_key.as_deref()
            && state
                .orders
                .iter()
                .any(|(o, k)| o.merchant_id == tenant.merchant_id() && k.as_deref() == Some(key))
        {
            return Err(InsertOrderError::DuplicateIdempotencyKey);
        }

        let mut requested: HashMap<ProductId, i64> = HashMap::new();
        for line in &order.items {
            *requested.entry(line.product_id).or_default() += i64::from(line.quantity);
        }
        let mut ids: Vec<ProductId> = requested.keys().copied().collect();
        ids.sort();

        for id in &ids {
            let wanted = requested.get(id).copied().unwrap_or_default();
            let available = state
                .products
                .iter()
                .find(|p| p.id == *id && p.merchant_id == tenant.merchant_id() && p.active)
                .map(|p| i64::from(p.stock));
            if available.is_none_or(|stock| stock < wanted) {
                return Err(InsertOrderError::OutOfStock(*id));
            }
        }

        let now = Utc::now();
        for product in &mut state.products {
            if product.merchant_id != tenant.merchant_id() {
                continue;
            }
            if let Some(wanted) = requested.get(&product.id) {
                let wanted = i32::try_from(*wanted)
                    .map_err(|_| InsertOrderError::OutOfStock(product.id))?;
                product.stock -= wanted;
                product.updated_at = now;
            }
        }

        let stored = Order {
            id: OrderId::new(state.next_id()),
            merchant_id: tenant.merchant_id(),
            code: order.code.clone(),
            customer: order.customer.clone(),
            items: order.items.clone(),
            subtotal: order.subtotal,
            shipping: order.shipping,
            total: order.total,
            payment_method: order.payment_method.clone(),
            notes: order.notes.clone(),
            status: OrderStatus::Pending,
            notification: NotificationState {
                status: NotificationStatus::Pending,
                error: None,
                notified_at: None,
            },
            fulfillment_log: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state
            .orders
            .push((stored.clone(), order.idempotency_key.clone()));
        Ok(stored)
    }

    async fn order(&self, tenant: Tenant, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.tenant_orders(tenant).find(|o| o.id == id).cloned())
    }

    async fn order_by_reference(
        &self,
        reference: &OrderReference,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let by_id = |id: OrderId| state.orders.iter().find(|(o, _)| o.id == id);
        let by_code = |code: &str| state.orders.iter().find(|(o, _)| o.code.as_str() == code);
        let found = match reference {
            OrderReference::Id(id) => by_id(*id),
            OrderReference::Code(code) => by_code(code),
            OrderReference::Ambiguous(id, code) => by_id(*id).or_else(|| by_code(code)),
        };
        Ok(found.map(|(o, _)| o.clone()))
    }

    async fn list_orders(
        &self,
        tenant: Tenant,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .tenant_orders(tenant)
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.created_from.is_none_or(|from| o.created_at >= from))
            .filter(|o| filter.created_to.is_none_or(|to| o.created_at <= to))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        tenant: Tenant,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.order_mut(tenant, id) else {
            return Ok(None);
        };
        let previous = order.status;
        match previous.transition_to(next) {
            Err(e) => Ok(Some(TransitionOutcome::Rejected(e))),
            Ok(changed) => {
                if changed {
                    order.status = next;
                    order.updated_at = Utc::now();
                }
                Ok(Some(TransitionOutcome::Applied {
                    order: order.clone(),
                    previous,
                }))
            }
        }
    }

    async fn set_order_notes(
        &self,
        tenant: Tenant,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.order_mut(tenant, id) else {
            return Ok(None);
        };
        order.notes = notes.map(str::to_owned);
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn record_notification(
        &self,
        tenant: Tenant,
        id: OrderId,
        outcome: &NotificationOutcome,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.order_mut(tenant, id) else {
            return Ok(());
        };
        match outcome {
            NotificationOutcome::Sent => {
                order.notification = NotificationState {
                    status: NotificationStatus::Sent,
                    error: None,
                    notified_at: Some(Utc::now()),
                };
            }
            NotificationOutcome::Failed(_) | NotificationOutcome::Disabled
                if order.notification.status != NotificationStatus::Sent =>
            {
                order.notification.status = outcome.status();
                order.notification.error = match outcome {
                    NotificationOutcome::Failed(message) => Some(message.clone()),
                    _ => None,
                };
            }
            _ => {}
        }
        Ok(())
    }

    async fn apply_callback(
        &self,
        tenant: Tenant,
        id: OrderId,
        update: &CallbackUpdate,
    ) -> Result<Option<CallbackApplied>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.order_mut(tenant, id) else {
            return Ok(None);
        };
        let previous = order.status;
        if let Some(target) = update.target
            && previous.can_transition_to(target)
        {
            order.status = target;
        }
        if let Some(addition) = update.notes.as_deref() {
            order.notes = Some(append_notes(order.notes.as_deref(), addition));
        }
        order.fulfillment_log.push(update.log_entry.clone());
        order.updated_at = Utc::now();
        Ok(Some(CallbackApplied {
            order: order.clone(),
            previous,
        }))
    }

    async fn notification_stats(
        &self,
        tenant: Tenant,
        since: DateTime<Utc>,
    ) -> Result<NotificationStats, RepositoryError> {
        let state = self.state.lock().await;
        let mut stats = NotificationStats::default();
        for order in state.tenant_orders(tenant).filter(|o| o.created_at >= since) {
            stats.total += 1;
            match order.notification.status {
                NotificationStatus::Sent => stats.sent += 1,
                NotificationStatus::Failed => stats.failed += 1,
                NotificationStatus::Pending | NotificationStatus::Disabled => {}
            }
            if !order.fulfillment_log.is_empty() {
                stats.with_response += 1;
            }
            match order.status {
                OrderStatus::Confirmed => stats.confirmed += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn dashboard_totals(&self, tenant: Tenant) -> Result<DashboardTotals, RepositoryError> {
        let state = self.state.lock().await;
        let mut totals = DashboardTotals::default();
        for order in state.tenant_orders(tenant) {
            match order.status {
                OrderStatus::Cancelled => totals.cancelled_orders += 1,
                status => {
                    totals.orders += 1;
                    totals.revenue += order.total.amount();
                    if status == OrderStatus::Pending {
                        totals.pending_orders += 1;
                    }
                }
            }
        }
        totals.active_products = state
            .products
            .iter()
            .filter(|p| p.merchant_id == tenant.merchant_id() && p.active)
            .count()
            .try_into()
            .unwrap_or(i64::MAX);
        Ok(totals)
    }

    async fn top_products(
        &self,
        tenant: Tenant,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let state = self.state.lock().await;
        let mut sold: HashMap<ProductId, i64> = HashMap::new();
        for order in state
            .tenant_orders(tenant)
            .filter(|o| o.status != OrderStatus::Cancelled)
        {
            for line in &order.items {
                *sold.entry(line.product_id).or_default() += i64::from(line.quantity);
            }
        }
        let mut top: Vec<TopProduct> = sold
            .into_iter()
            .map(|(product_id, units_sold)| TopProduct {
                product_id,
                name: state
                    .products
                    .iter()
                    .find(|p| p.id == product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                units_sold,
            })
            .collect();
        top.sort_by(|a, b| {
            b.units_sold
                .cmp(&a.units_sold)
                .then(a.product_id.cmp(&b.product_id))
        });
        top.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(top)
    }

    async fn daily_sales(
        &self,
        tenant: Tenant,
        since: NaiveDate,
    ) -> Result<Vec<DailySales>, RepositoryError> {
        let state = self.state.lock().await;
        let mut by_day: HashMap<NaiveDate, DailySales> = HashMap::new();
        for order in state
            .tenant_orders(tenant)
            .filter(|o| o.status != OrderStatus::Cancelled)
        {
            let date = order.created_at.date_naive();
            if date < since {
                continue;
            }
            by_day
                .entry(date)
                .or_insert_with(|| DailySales {
                    date,
                    revenue: rust_decimal::Decimal::ZERO,
                })
                .revenue += order.total.amount();
        }
        let mut days: Vec<DailySales> = by_day.into_values().collect();
        days.sort_by_key(|d| d.date);
        Ok(days)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
