//! Product models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use live_commerce_core::{MerchantId, Money, ProductId};

/// A tenant-owned product.
///
/// `stock` is never negative; the database enforces it with a check
/// constraint and reservations decrement it conditionally.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(skip)]
    pub merchant_id: MerchantId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated product fields for create and update.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
}

/// Catalog list filters.
///
/// `category` matches exactly, ignoring case. `search` is a substring of the
/// name or description, also ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub include_inactive: bool,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductFilter {
    /// Active products only, no further narrowing.
    #[must_use]
    pub fn active() -> Self {
        Self::default()
    }

    /// Every product, inactive included.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include_inactive: true,
            ..Self::default()
        }
    }

    /// Whether `product` passes the filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.active {
            return false;
        }
        if let Some(category) = &self.category
            && !product
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == category.to_lowercase())
        {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
        }
    }

    /// The search term as an `ILIKE` pattern, with wildcards in the term
    /// escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|term| {
            let mut pattern = String::with_capacity(term.len() + 2);
            pattern.push('%');
            for c in term.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, description: Option<&str>, category: Option<&str>) -> Product {
        Product {
            id: ProductId::new(1),
            merchant_id: MerchantId::new(1),
            name: name.to_owned(),
            description: description.map(str::to_owned),
            price: Money::from_cents(100),
            stock: 1,
            category: category.map(str::to_owned),
            image_url: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_category_and_search() {
        let shirt = product("Linen Shirt", Some("Breathable summer wear"), Some("Clothing"));
        let mug = product("Mug", None, None);

        let clothing = ProductFilter {
            category: Some("clothing".into()),
            ..ProductFilter::active()
        };
        assert!(clothing.matches(&shirt));
        assert!(!clothing.matches(&mug));

        let summer = ProductFilter {
            search: Some("SUMMER".into()),
            ..ProductFilter::active()
        };
        assert!(summer.matches(&shirt));
        assert!(!summer.matches(&mug));
    }

    #[test]
    fn test_filter_inactive() {
        let mut mug = product("Mug", None, None);
        mug.active = false;
        assert!(!ProductFilter::active().matches(&mug));
        assert!(ProductFilter::all().matches(&mug));
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = ProductFilter {
            search: Some("50%_off".into()),
            ..ProductFilter::active()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(ProductFilter::active().search_pattern(), None);
    }
}
