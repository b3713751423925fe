//! Dashboard aggregates.
//!
//! Field names follow the admin UI's existing keys.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use live_commerce_core::ProductId;

/// Scalar counters for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct DashboardTotals {
    /// Orders that are not cancelled.
    pub orders: i64,
    /// Revenue over orders that are not cancelled.
    pub revenue: Decimal,
    pub pending_orders: i64,
    pub cancelled_orders: i64,
    pub active_products: i64,
}

/// A best-selling product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: ProductId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "totalVendido")]
    pub units_sold: i64,
}

/// Revenue for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailySales {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "ventas")]
    pub revenue: Decimal,
}

/// The dashboard response.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(rename = "totalPedidos")]
    pub total_orders: i64,
    #[serde(rename = "totalVentas")]
    pub total_revenue: Decimal,
    #[serde(rename = "pedidosPendientes")]
    pub pending_orders: i64,
    #[serde(rename = "pedidosCancelados")]
    pub cancelled_orders: i64,
    #[serde(rename = "totalProductos")]
    pub active_products: i64,
    #[serde(rename = "topProductos")]
    pub top_products: Vec<TopProduct>,
    #[serde(rename = "ventasPorDia")]
    pub daily_sales: Vec<DailySales>,
}
