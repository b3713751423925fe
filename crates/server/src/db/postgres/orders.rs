//! Order queries, including the transactional insert that reserves stock.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use live_commerce_core::{
    Email, MerchantId, Money, NotificationStatus, OrderCode, OrderId, OrderStatus, Phone,
};

use crate::db::RepositoryError;
use crate::models::order::{NotificationState, append_notes};
use crate::models::{
    CallbackApplied, CallbackUpdate, Customer, InsertOrderError, NewOrder, NotificationOutcome,
    NotificationStats, Order, OrderFilter, OrderLine, OrderReference, TransitionOutcome,
};
use crate::tenant::Tenant;

/// Columns selected for every order read.
macro_rules! order_columns {
    () => {
        "id, merchant_id, code, customer_phone, customer_name, customer_email, \
         customer_address, items, subtotal, shipping, total, payment_method, notes, status, \
         notification_status, notification_error, notified_at, fulfillment_log, created_at, \
         updated_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    merchant_id: MerchantId,
    code: String,
    customer_phone: String,
    customer_name: String,
    customer_email: Option<String>,
    customer_address: Option<String>,
    items: Json<Vec<OrderLine>>,
    subtotal: Money,
    shipping: Money,
    total: Money,
    payment_method: Option<String>,
    notes: Option<String>,
    status: OrderStatus,
    notification_status: NotificationStatus,
    notification_error: Option<String>,
    notified_at: Option<DateTime<Utc>>,
    fulfillment_log: Json<Vec<serde_json::Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let code = OrderCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order code in database: {e}"))
        })?;
        let phone = Phone::parse(&row.customer_phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;
        let email = row
            .customer_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            merchant_id: row.merchant_id,
            code,
            customer: Customer {
                phone,
                name: row.customer_name,
                email,
                address: row.customer_address,
            },
            items: row.items.0,
            subtotal: row.subtotal,
            shipping: row.shipping,
            total: row.total,
            payment_method: row.payment_method,
            notes: row.notes,
            status: row.status,
            notification: NotificationState {
                status: row.notification_status,
                error: row.notification_error,
                notified_at: row.notified_at,
            },
            fulfillment_log: row.fulfillment_log.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for orders and their lines.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Check whether an order code is already in use by any tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn code_exists(&self, code: &OrderCode) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE code = $1)")
                .bind(code.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Find the order a tenant placed with an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_idempotency_key(
        &self,
        tenant: Tenant,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE merchant_id = $1 AND idempotency_key = $2"
        ))
        .bind(tenant.merchant_id())
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Insert an order, its lines and its stock decrements atomically.
    ///
    /// Decrements are conditional (`stock >= quantity`) and applied in
    /// ascending product ID order so concurrent orders lock rows in the same
    /// sequence. Any failure rolls back the whole transaction.
    ///
    /// # Errors
    ///
    /// Returns `InsertOrderError::CodeTaken` or
    /// `InsertOrderError::DuplicateIdempotencyKey` on unique violations,
    /// `InsertOrderError::OutOfStock` when a decrement matches no row, and
    /// `InsertOrderError::Repository` for other database errors.
    pub async fn insert(&self, tenant: Tenant, order: &NewOrder) -> Result<Order, InsertOrderError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "INSERT INTO orders (merchant_id, code, idempotency_key, customer_phone, \
             customer_name, customer_email, customer_address, items, subtotal, shipping, total, \
             payment_method, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING ",
            order_columns!()
        ))
        .bind(tenant.merchant_id())
        .bind(order.code.as_str())
        .bind(order.idempotency_key.as_deref())
        .bind(order.customer.phone.as_str())
        .bind(&order.customer.name)
        .bind(order.customer.email.as_ref().map(Email::as_str))
        .bind(order.customer.address.as_deref())
        .bind(Json(&order.items))
        .bind(order.subtotal)
        .bind(order.shipping)
        .bind(order.total)
        .bind(order.payment_method.as_deref())
        .bind(order.notes.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        for line in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(quantity_param(line)?)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        }

        let mut reservations: Vec<&OrderLine> = order.items.iter().collect();
        reservations.sort_by_key(|line| line.product_id);

        for line in reservations {
            let result = sqlx::query(
                r"
                UPDATE products
                SET stock = stock - $3, updated_at = NOW()
                WHERE id = $1 AND merchant_id = $2 AND active AND stock >= $3
                ",
            )
            .bind(line.product_id)
            .bind(tenant.merchant_id())
            .bind(quantity_param(line)?)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            if result.rows_affected() == 0 {
                tx.rollback().await.map_err(RepositoryError::from)?;
                return Err(InsertOrderError::OutOfStock(line.product_id));
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(row.try_into()?)
    }

    /// Get one of the tenant's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, tenant: Tenant, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1 AND merchant_id = $2"
        ))
        .bind(id)
        .bind(tenant.merchant_id())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Find an order by ID or code, across tenants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reference(
        &self,
        reference: &OrderReference,
    ) -> Result<Option<Order>, RepositoryError> {
        match reference {
            OrderReference::Id(id) => self.get_by_id_unscoped(*id).await,
            OrderReference::Code(code) => self.get_by_code(code).await,
            OrderReference::Ambiguous(id, code) => match self.get_by_id_unscoped(*id).await? {
                Some(order) => Ok(Some(order)),
                None => self.get_by_code(code).await,
            },
        }
    }

    async fn get_by_id_unscoped(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// List the tenant's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        tenant: Tenant,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders \
             WHERE merchant_id = $1 \
               AND ($2::order_status IS NULL OR status = $2) \
               AND ($3::timestamptz IS NULL OR created_at >= $3) \
               AND ($4::timestamptz IS NULL OR created_at <= $4) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(tenant.merchant_id())
        .bind(filter.status)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Apply a lifecycle transition under a row lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn transition_status(
        &self,
        tenant: Tenant,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Option<TransitionOutcome>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(previous) = lock_status(&mut tx, tenant, id).await? else {
            return Ok(None);
        };

        match previous.transition_to(next) {
            Err(e) => {
                tx.rollback().await?;
                Ok(Some(TransitionOutcome::Rejected(e)))
            }
            Ok(changed) => {
                let row = sqlx::query_as::<_, OrderRow>(concat!(
                    "UPDATE orders \
                     SET status = $3, \
                         updated_at = CASE WHEN $4 THEN NOW() ELSE updated_at END \
                     WHERE id = $1 AND merchant_id = $2 RETURNING ",
                    order_columns!()
                ))
                .bind(id)
                .bind(tenant.merchant_id())
                .bind(next)
                .bind(changed)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;

                Ok(Some(TransitionOutcome::Applied {
                    order: row.try_into()?,
                    previous,
                }))
            }
        }
    }

    /// Replace an order's notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_notes(
        &self,
        tenant: Tenant,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "UPDATE orders SET notes = $3, updated_at = NOW() \
             WHERE id = $1 AND merchant_id = $2 RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(tenant.merchant_id())
        .bind(notes)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Record the result of a notification attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_notification(
        &self,
        tenant: Tenant,
        id: OrderId,
        outcome: &NotificationOutcome,
    ) -> Result<(), RepositoryError> {
        match outcome {
            NotificationOutcome::Sent => {
                sqlx::query(
                    r"
                    UPDATE orders
                    SET notification_status = 'sent', notification_error = NULL,
                        notified_at = NOW()
                    WHERE id = $1 AND merchant_id = $2
                    ",
                )
                .bind(id)
                .bind(tenant.merchant_id())
                .execute(self.pool)
                .await?;
            }
            NotificationOutcome::Failed(_) | NotificationOutcome::Disabled => {
                let error = match outcome {
                    NotificationOutcome::Failed(message) => Some(message.as_str()),
                    _ => None,
                };
                sqlx::query(
                    r"
                    UPDATE orders
                    SET notification_status = $3, notification_error = $4
                    WHERE id = $1 AND merchant_id = $2 AND notification_status <> 'sent'
                    ",
                )
                .bind(id)
                .bind(tenant.merchant_id())
                .bind(outcome.status())
                .bind(error)
                .execute(self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Apply a fulfillment bot callback under a row lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn apply_callback(
        &self,
        tenant: Tenant,
        id: OrderId,
        update: &CallbackUpdate,
    ) -> Result<Option<CallbackApplied>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(OrderStatus, Option<String>)> = sqlx::query_as(
            "SELECT status, notes FROM orders WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant.merchant_id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((previous, notes)) = current else {
            return Ok(None);
        };

        let next = update
            .target
            .filter(|target| previous.can_transition_to(*target))
            .unwrap_or(previous);
        let notes = match update.notes.as_deref() {
            Some(addition) => Some(append_notes(notes.as_deref(), addition)),
            None => notes,
        };

        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "UPDATE orders \
             SET status = $3, notes = $4, fulfillment_log = fulfillment_log || $5, \
                 updated_at = NOW() \
             WHERE id = $1 AND merchant_id = $2 RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(tenant.merchant_id())
        .bind(next)
        .bind(notes)
        .bind(Json(vec![&update.log_entry]))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(CallbackApplied {
            order: row.try_into()?,
            previous,
        }))
    }

    /// Count notification outcomes for orders created since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn notification_stats(
        &self,
        tenant: Tenant,
        since: DateTime<Utc>,
    ) -> Result<NotificationStats, RepositoryError> {
        let stats = sqlx::query_as::<_, NotificationStats>(
            r"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE notification_status = 'sent') AS sent,
                   COUNT(*) FILTER (WHERE notification_status = 'failed') AS failed,
                   COUNT(*) FILTER (WHERE jsonb_array_length(fulfillment_log) > 0) AS with_response,
                   COUNT(*) FILTER (WHERE status = 'confirmed') AS confirmed,
                   COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
            FROM orders
            WHERE merchant_id = $1 AND created_at >= $2
            ",
        )
        .bind(tenant.merchant_id())
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }
}

async fn lock_status(
    tx: &mut Transaction<'_, Postgres>,
    tenant: Tenant,
    id: OrderId,
) -> Result<Option<OrderStatus>, RepositoryError> {
    let status: Option<OrderStatus> = sqlx::query_scalar(
        "SELECT status FROM orders WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(tenant.merchant_id())
    .fetch_optional(&mut **tx)
    .await?;
    Ok(status)
}

fn quantity_param(line: &OrderLine) -> Result<i32, InsertOrderError> {
    i32::try_from(line.quantity).map_err(|_| InsertOrderError::OutOfStock(line.product_id))
}

/// Classify unique violations on the order header.
fn map_insert_error(e: sqlx::Error) -> InsertOrderError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return match db_err.constraint() {
            Some("orders_idempotency_key") => InsertOrderError::DuplicateIdempotencyKey,
            _ => InsertOrderError::CodeTaken,
        };
    }
    InsertOrderError::Repository(RepositoryError::Database(e))
}
