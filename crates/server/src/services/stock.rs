//! Stock availability rules.
//!
//! Assessment is a pure function over product snapshots. The reservation
//! itself happens inside the order insert, where each decrement is a
//! conditional `stock = stock - q WHERE stock >= q` so concurrent orders can
//! never drive stock below zero.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use live_commerce_core::ProductId;

use crate::db::{CatalogStore, RepositoryError};
use crate::models::Product;
use crate::tenant::Tenant;

/// One requested product after merging duplicate cart lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price the client saw when adding the item. Display only.
    pub price_hint: Option<Decimal>,
}

/// Why a line cannot be fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortageReason {
    NotFound,
    Inactive,
    InsufficientStock,
}

/// A line that cannot be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortage {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub requested: u32,
    pub available: i32,
    pub reason: ShortageReason,
}

/// Result of an availability check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    pub shortages: Vec<Shortage>,
}

impl Availability {
    /// Whether every line can be fulfilled.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.shortages.is_empty()
    }
}

/// Merge lines naming the same product, summing quantities.
///
/// First-seen order is kept. The first price hint for a product wins.
#[must_use]
pub fn merge_lines(lines: impl IntoIterator<Item = LineRequest>) -> Vec<LineRequest> {
    let mut merged: Vec<LineRequest> = Vec::new();
    let mut index: HashMap<ProductId, usize> = HashMap::new();

    for line in lines {
        if let Some(existing) = index
            .get(&line.product_id)
            .and_then(|&i| merged.get_mut(i))
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            if existing.price_hint.is_none() {
                existing.price_hint = line.price_hint;
            }
        } else {
            index.insert(line.product_id, merged.len());
            merged.push(line);
        }
    }

    merged
}

/// Check every line against the product snapshots.
///
/// A product missing from `products` counts as not found; an inactive one
/// as unavailable regardless of its stock.
#[must_use]
pub fn assess(lines: &[LineRequest], products: &[Product]) -> Availability {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let shortages = lines
        .iter()
        .filter_map(|line| {
            let shortage = |name: Option<String>, available: i32, reason| Shortage {
                product_id: line.product_id,
                name,
                requested: line.quantity,
                available,
                reason,
            };
            match by_id.get(&line.product_id) {
                None => Some(shortage(None, 0, ShortageReason::NotFound)),
                Some(p) if !p.active => {
                    Some(shortage(Some(p.name.clone()), 0, ShortageReason::Inactive))
                }
                Some(p) if i64::from(p.stock) < i64::from(line.quantity) => Some(shortage(
                    Some(p.name.clone()),
                    p.stock,
                    ShortageReason::InsufficientStock,
                )),
                Some(_) => None,
            }
        })
        .collect();

    Availability { shortages }
}

/// Tenant-scoped availability checks against the store.
pub struct StockLedger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> StockLedger<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Load the tenant's products named by `lines`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn snapshot(
        &self,
        tenant: Tenant,
        lines: &[LineRequest],
    ) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        self.store.products_by_ids(tenant, &ids).await
    }

    /// Report which lines cannot currently be fulfilled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn check_availability(
        &self,
        tenant: Tenant,
        lines: &[LineRequest],
    ) -> Result<Availability, RepositoryError> {
        let products = self.snapshot(tenant, lines).await?;
        Ok(assess(lines, &products))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use live_commerce_core::{MerchantId, Money};

    use super::*;

    fn product(id: i32, stock: i32, active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            merchant_id: MerchantId::new(1),
            name: format!("Product {id}"),
            description: None,
            price: Money::from_cents(1000),
            stock,
            category: None,
            image_url: None,
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: i32, quantity: u32) -> LineRequest {
        LineRequest {
            product_id: ProductId::new(id),
            quantity,
            price_hint: None,
        }
    }

    #[test]
    fn test_merge_lines() {
        let mut first = line(2, 1);
        first.price_hint = Some(Decimal::new(999, 2));
        let merged = merge_lines([first, line(1, 3), line(2, 4)]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].product_id, ProductId::new(2));
        assert_eq!(merged[0].quantity, 5);
        assert_eq!(merged[0].price_hint, Some(Decimal::new(999, 2)));
        assert_eq!(merged[1].quantity, 3);
    }

    #[test]
    fn test_assess_ok() {
        let products = [product(1, 5, true)];
        assert!(assess(&[line(1, 5)], &products).is_ok());
    }

    #[test]
    fn test_assess_reports_every_shortage() {
        let products = [product(1, 5, true), product(2, 0, true), product(3, 9, false)];
        let result = assess(&[line(1, 2), line(2, 1), line(3, 1), line(4, 1)], &products);

        assert!(!result.is_ok());
        let reasons: Vec<_> = result
            .shortages
            .iter()
            .map(|s| (s.product_id.as_i32(), s.reason, s.available))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (2, ShortageReason::InsufficientStock, 0),
                (3, ShortageReason::Inactive, 0),
                (4, ShortageReason::NotFound, 0),
            ]
        );
        assert_eq!(result.shortages[0].name.as_deref(), Some("Product 2"));
        assert!(result.shortages[2].name.is_none());
    }

    #[test]
    fn test_shortage_serialization() {
        let shortage = Shortage {
            product_id: ProductId::new(7),
            name: Some("Widget".to_owned()),
            requested: 3,
            available: 1,
            reason: ShortageReason::InsufficientStock,
        };
        let json = serde_json::to_value(&shortage).unwrap();
        assert_eq!(json["productId"], 7);
        assert_eq!(json["reason"], "insufficient_stock");
    }
}
