//! Dashboard aggregate queries. Cancelled orders never count as sales.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::db::RepositoryError;
use crate::models::{DailySales, DashboardTotals, TopProduct};
use crate::tenant::Tenant;

/// Repository for read-only dashboard aggregates.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Order, revenue and product counters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(&self, tenant: Tenant) -> Result<DashboardTotals, RepositoryError> {
        let totals = sqlx::query_as::<_, DashboardTotals>(
            r"
            SELECT
                COUNT(*) FILTER (WHERE o.status <> 'cancelled') AS orders,
                COALESCE(SUM(o.total) FILTER (WHERE o.status <> 'cancelled'), 0) AS revenue,
                COUNT(*) FILTER (WHERE o.status = 'pending') AS pending_orders,
                COUNT(*) FILTER (WHERE o.status = 'cancelled') AS cancelled_orders,
                (SELECT COUNT(*) FROM products p WHERE p.merchant_id = $1 AND p.active)
                    AS active_products
            FROM orders o
            WHERE o.merchant_id = $1
            ",
        )
        .bind(tenant.merchant_id())
        .fetch_one(self.pool)
        .await?;

        Ok(totals)
    }

    /// Best sellers by units on orders that are not cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        tenant: Tenant,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let products = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT oi.product_id, p.name, SUM(oi.quantity)::BIGINT AS units_sold
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            WHERE o.merchant_id = $1 AND o.status <> 'cancelled'
            GROUP BY oi.product_id, p.name
            ORDER BY units_sold DESC, oi.product_id
            LIMIT $2
            ",
        )
        .bind(tenant.merchant_id())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Revenue per UTC day from `since` onwards. Days without sales are
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_sales(
        &self,
        tenant: Tenant,
        since: NaiveDate,
    ) -> Result<Vec<DailySales>, RepositoryError> {
        let days = sqlx::query_as::<_, DailySales>(
            r"
            SELECT (created_at AT TIME ZONE 'UTC')::DATE AS date, SUM(total) AS revenue
            FROM orders
            WHERE merchant_id = $1
              AND status <> 'cancelled'
              AND (created_at AT TIME ZONE 'UTC')::DATE >= $2
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(tenant.merchant_id())
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(days)
    }
}
