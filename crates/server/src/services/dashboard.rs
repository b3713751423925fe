//! Dashboard aggregates.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::db::{RepositoryError, ReportStore};
use crate::models::{DailySales, Dashboard};
use crate::tenant::Tenant;

/// Number of best sellers reported.
pub const TOP_PRODUCTS: i64 = 5;

/// Days in the sales series, today included.
pub const SALES_WINDOW_DAYS: u64 = 7;

/// Build the tenant's dashboard as of the UTC date `today`.
///
/// An empty store yields zeros and a zero-filled series, never an error.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
#[tracing::instrument(skip(store))]
pub async fn build<S>(store: &S, tenant: Tenant, today: NaiveDate) -> Result<Dashboard, RepositoryError>
where
    S: ReportStore + ?Sized,
{
    let start = window_start(today);

    let totals = store.dashboard_totals(tenant).await?;
    let top_products = store.top_products(tenant, TOP_PRODUCTS).await?;
    let sales = store.daily_sales(tenant, start).await?;

    Ok(Dashboard {
        total_orders: totals.orders,
        total_revenue: totals.revenue,
        pending_orders: totals.pending_orders,
        cancelled_orders: totals.cancelled_orders,
        active_products: totals.active_products,
        top_products,
        daily_sales: fill_window(today, &sales),
    })
}

fn window_start(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(SALES_WINDOW_DAYS - 1))
        .unwrap_or(NaiveDate::MIN)
}

/// One point per day of the window, ascending, missing days at zero.
#[must_use]
pub fn fill_window(today: NaiveDate, sales: &[DailySales]) -> Vec<DailySales> {
    window_start(today)
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|date| DailySales {
            date,
            revenue: sales
                .iter()
                .filter(|s| s.date == date)
                .map(|s| s.revenue)
                .sum::<Decimal>(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_fill_window_empty() {
        let series = fill_window(day(14), &[]);
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, day(8));
        assert_eq!(series[6].date, day(14));
        assert!(series.iter().all(|s| s.revenue.is_zero()));
    }

    #[test]
    fn test_fill_window_places_sales() {
        let sales = [
            DailySales {
                date: day(10),
                revenue: Decimal::new(2000, 2),
            },
            DailySales {
                date: day(14),
                revenue: Decimal::new(550, 2),
            },
            DailySales {
                date: day(1),
                revenue: Decimal::new(9900, 2),
            },
        ];
        let series = fill_window(day(14), &sales);

        assert_eq!(series.len(), 7);
        assert_eq!(series[2].revenue, Decimal::new(2000, 2));
        assert_eq!(series[6].revenue, Decimal::new(550, 2));
        let total: Decimal = series.iter().map(|s| s.revenue).sum();
        assert_eq!(total, Decimal::new(2550, 2));
    }

    #[test]
    fn test_dashboard_keys() {
        let dashboard = Dashboard {
            total_orders: 1,
            total_revenue: Decimal::new(2000, 2),
            pending_orders: 0,
            cancelled_orders: 1,
            active_products: 3,
            top_products: Vec::new(),
            daily_sales: fill_window(day(14), &[]),
        };
        let json = serde_json::to_value(&dashboard).unwrap();
        for key in [
            "totalPedidos",
            "totalVentas",
            "pedidosPendientes",
            "pedidosCancelados",
            "totalProductos",
            "topProductos",
            "ventasPorDia",
        ] {
            assert!(json.get(key).is_some(), "{key}");
        }
        assert_eq!(json["totalVentas"], "20.00");
        assert_eq!(json["ventasPorDia"][0]["fecha"], "2026-03-08");
    }
}
