//! Order assembly.
//!
//! Placing an order re-prices every line from the catalog, checks stock,
//! allocates a code and writes header, lines and stock decrements in one
//! transaction. The fulfillment bot is notified afterwards from a detached
//! task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;

use live_commerce_core::{Money, OrderId, OrderStatus, ProductId, StatusError};

use super::fulfillment::FulfillmentNotifier;
use super::order_code::{CodeAttempts, CodeError, OrderCodeGenerator};
use super::stock::{LineRequest, Shortage, ShortageReason, StockLedger, assess};
use crate::db::{RepositoryError, Store};
use crate::models::{
    Customer, InsertOrderError, NewOrder, NotificationOutcome, Order, OrderFilter, OrderLine,
    Product, TransitionOutcome,
};
use crate::tenant::Tenant;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("quantity must be positive for product {0}")]
    InvalidQuantity(ProductId),

    /// The tenant has no store to take shipping rules from.
    #[error("store not found")]
    StoreNotFound,

    #[error("order not found")]
    NotFound,

    #[error("insufficient stock")]
    StockShortage(Vec<Shortage>),

    #[error(transparent)]
    Code(#[from] CodeError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A validated order request.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer: Customer,
    /// Merged lines, one per product.
    pub lines: Vec<LineRequest>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Merchant edits to an existing order. Absent fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

/// Result of placing an order.
#[derive(Debug)]
pub struct Placed {
    pub order: Order,
    /// The order already existed under the same idempotency key.
    pub replayed: bool,
    /// The background notification, when one was started.
    pub notification: Option<JoinHandle<NotificationOutcome>>,
}

/// Order lifecycle operations for one store backend.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    codes: OrderCodeGenerator,
    notifier: FulfillmentNotifier,
}

impl OrderService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        codes: OrderCodeGenerator,
        notifier: FulfillmentNotifier,
    ) -> Self {
        Self {
            store,
            codes,
            notifier,
        }
    }

    /// Place an order for `tenant`.
    ///
    /// Either the whole order commits, with its lines and stock decrements,
    /// or nothing is written. A repeated idempotency key returns the
    /// original order without touching stock.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` / `InvalidQuantity` for malformed drafts
    /// - `StoreNotFound` when the tenant has no store
    /// - `StockShortage` listing every line that cannot be fulfilled
    /// - `Code(CodeError::Exhausted)` when no unique code could be allocated
    /// - `Repository` on storage failure
    #[tracing::instrument(skip(self, draft), fields(tenant = %tenant, lines = draft.lines.len()))]
    pub async fn place(&self, tenant: Tenant, draft: OrderDraft) -> Result<Placed, OrderError> {
        if draft.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if let Some(line) = draft.lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidQuantity(line.product_id));
        }

        if let Some(key) = draft.idempotency_key.as_deref()
            && let Some(order) = self.store.order_by_idempotency_key(tenant, key).await?
        {
            tracing::info!(order_id = %order.id, "Idempotent replay");
            return Ok(Self::replayed(order));
        }

        let storefront = self
            .store
            .storefront(tenant)
            .await?
            .ok_or(OrderError::StoreNotFound)?;

        let ledger = StockLedger::new(self.store.as_ref());
        let products = ledger.snapshot(tenant, &draft.lines).await?;
        let availability = assess(&draft.lines, &products);
        if !availability.is_ok() {
            return Err(OrderError::StockShortage(availability.shortages));
        }

        let items = price_lines(&draft.lines, &products);
        let subtotal: Money = items.iter().map(|l| l.line_total).sum();
        let shipping = storefront.shipping_cost;
        let total = subtotal + shipping;

        let mut attempts = CodeAttempts::default();
        let order = loop {
            let code = self
                .codes
                .generate(self.store.as_ref(), Utc::now().date_naive(), &mut attempts)
                .await?;

            let new = NewOrder {
                code,
                idempotency_key: draft.idempotency_key.clone(),
                customer: draft.customer.clone(),
                items: items.clone(),
                subtotal,
                shipping,
                total,
                payment_method: draft.payment_method.clone(),
                notes: draft.notes.clone(),
            };

            match self.store.insert_order(tenant, &new).await {
                Ok(order) => break order,
                Err(InsertOrderError::CodeTaken) => {
                    tracing::debug!(code = %new.code, "Order code taken at insert, retrying");
                }
                Err(InsertOrderError::DuplicateIdempotencyKey) => {
                    let key = new.idempotency_key.as_deref().unwrap_or_default();
                    let order = self
                        .store
                        .order_by_idempotency_key(tenant, key)
                        .await?
                        .ok_or(RepositoryError::NotFound)?;
                    return Ok(Self::replayed(order));
                }
                Err(InsertOrderError::OutOfStock(product_id)) => {
                    return Err(self.refreshed_shortage(tenant, &draft.lines, product_id).await);
                }
                Err(InsertOrderError::Repository(e)) => return Err(e.into()),
            }
        };

        tracing::info!(
            order_id = %order.id,
            code = %order.code,
            total = %order.total,
            "Order placed"
        );

        let notification = self
            .notifier
            .dispatch(Arc::clone(&self.store), tenant, order.clone());

        Ok(Placed {
            order,
            replayed: false,
            notification: Some(notification),
        })
    }

    /// List the tenant's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn list(&self, tenant: Tenant, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(tenant, filter).await?)
    }

    /// Fetch one of the tenant's orders.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and for other tenants' orders.
    pub async fn get(&self, tenant: Tenant, id: OrderId) -> Result<Order, OrderError> {
        self.store
            .order(tenant, id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Move an order along its lifecycle.
    ///
    /// Requesting the current status is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the order is not the tenant's, or
    /// `Status(IllegalTransition)` when the lifecycle forbids the move.
    #[tracing::instrument(skip(self), fields(tenant = %tenant))]
    pub async fn change_status(
        &self,
        tenant: Tenant,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        match self.store.transition_status(tenant, id, next).await? {
            None => Err(OrderError::NotFound),
            Some(TransitionOutcome::Rejected(e)) => Err(e.into()),
            Some(TransitionOutcome::Applied { order, previous }) => {
                if previous != order.status {
                    tracing::info!(order_id = %id, from = %previous, to = %order.status, "Order status changed");
                }
                Ok(order)
            }
        }
    }

    /// Apply a merchant edit: the status change first, then the notes.
    ///
    /// A rejected transition leaves the notes untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::change_status`].
    #[tracing::instrument(skip(self, update), fields(tenant = %tenant))]
    pub async fn update(
        &self,
        tenant: Tenant,
        id: OrderId,
        update: OrderUpdate,
    ) -> Result<Order, OrderError> {
        let mut order = match update.status {
            Some(next) => Some(self.change_status(tenant, id, next).await?),
            None => None,
        };
        if let Some(notes) = update.notes {
            let updated = self
                .store
                .set_order_notes(tenant, id, notes.as_deref())
                .await?
                .ok_or(OrderError::NotFound)?;
            tracing::info!(order_id = %id, "Order notes updated");
            order = Some(updated);
        }
        match order {
            Some(order) => Ok(order),
            None => self.get(tenant, id).await,
        }
    }

    /// Cancel an order. Reserved stock is not returned.
    ///
    /// # Errors
    ///
    /// Same as [`Self::change_status`].
    pub async fn cancel(&self, tenant: Tenant, id: OrderId) -> Result<Order, OrderError> {
        self.change_status(tenant, id, OrderStatus::Cancelled).await
    }

    const fn replayed(order: Order) -> Placed {
        Placed {
            order,
            replayed: true,
            notification: None,
        }
    }

    /// Build the shortage report after a conditional decrement failed.
    async fn refreshed_shortage(
        &self,
        tenant: Tenant,
        lines: &[LineRequest],
        failed: ProductId,
    ) -> OrderError {
        let ledger = StockLedger::new(self.store.as_ref());
        let mut shortages = match ledger.check_availability(tenant, lines).await {
            Ok(availability) => availability.shortages,
            Err(e) => return e.into(),
        };
        if shortages.is_empty()
            && let Some(line) = lines.iter().find(|l| l.product_id == failed)
        {
            shortages.push(Shortage {
                product_id: failed,
                name: None,
                requested: line.quantity,
                available: 0,
                reason: ShortageReason::InsufficientStock,
            });
        }
        tracing::info!(product_id = %failed, "Stock reservation lost a race");
        OrderError::StockShortage(shortages)
    }
}

/// Price every line from the catalog snapshot. Client hints are ignored.
fn price_lines(lines: &[LineRequest], products: &[Product]) -> Vec<OrderLine> {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    lines
        .iter()
        .filter_map(|line| {
            let product = by_id.get(&line.product_id)?;
            if let Some(hint) = line.price_hint
                && hint != product.price.amount()
            {
                tracing::debug!(
                    product_id = %product.id,
                    hint = %hint,
                    price = %product.price,
                    "Client price differs from catalog price"
                );
            }
            Some(OrderLine {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
                line_total: product.price.times(line.quantity),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use live_commerce_core::MerchantId;

    use super::*;

    fn product(id: i32, cents: u32) -> Product {
        Product {
            id: ProductId::new(id),
            merchant_id: MerchantId::new(1),
            name: format!("Product {id}"),
            description: None,
            price: Money::from_cents(cents),
            stock: 10,
            category: None,
            image_url: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_lines_uses_catalog_price() {
        let lines = [
            LineRequest {
                product_id: ProductId::new(1),
                quantity: 2,
                price_hint: Some(Decimal::new(1, 2)),
            },
            LineRequest {
                product_id: ProductId::new(2),
                quantity: 3,
                price_hint: None,
            },
        ];
        let priced = price_lines(&lines, &[product(1, 1000), product(2, 250)]);

        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].unit_price, Money::from_cents(1000));
        assert_eq!(priced[0].line_total, Money::from_cents(2000));
        assert_eq!(priced[1].line_total, Money::from_cents(750));
        let subtotal: Money = priced.iter().map(|l| l.line_total).sum();
        assert_eq!(subtotal, Money::from_cents(2750));
    }
}
