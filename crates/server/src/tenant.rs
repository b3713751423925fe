//! Tenant scoping.
//!
//! A [`Tenant`] is the merchant every catalog, order and report operation is
//! filtered by. It is built only from an authenticated session or from a
//! public slug lookup, never from a client-supplied id.

use live_commerce_core::{MerchantId, Slug};

use crate::db::CatalogStore;
use crate::error::AppError;
use crate::models::{CurrentMerchant, Storefront};

/// The merchant a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tenant(MerchantId);

impl Tenant {
    /// Scope to a merchant.
    #[must_use]
    pub const fn new(merchant_id: MerchantId) -> Self {
        Self(merchant_id)
    }

    /// The merchant id used in every query filter.
    #[must_use]
    pub const fn merchant_id(self) -> MerchantId {
        self.0
    }

    /// Resolve a public storefront slug to its tenant.
    ///
    /// Matching is exact and case-sensitive. Malformed slugs, unknown slugs
    /// and inactive merchants or stores are all reported as not found.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when no active storefront matches, or
    /// `AppError::Database` if the lookup fails.
    pub async fn resolve_slug<S>(store: &S, raw: &str) -> Result<(Self, Storefront), AppError>
    where
        S: CatalogStore + ?Sized,
    {
        let not_found = || AppError::NotFound("store not found".to_owned());
        let slug = Slug::parse(raw).map_err(|_| not_found())?;
        let storefront = store.storefront_by_slug(&slug).await?.ok_or_else(not_found)?;
        Ok((Self(storefront.merchant_id), storefront))
    }
}

impl From<&CurrentMerchant> for Tenant {
    fn from(merchant: &CurrentMerchant) -> Self {
        Self(merchant.id)
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "merchant:{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewMerchant;
    use live_commerce_core::Email;

    async fn seed(store: &MemoryStore, slug: &str) -> MerchantId {
        let new = NewMerchant {
            email: Email::parse(&format!("{slug}@example.com")).unwrap(),
            name: slug.to_owned(),
            phone: None,
            country: None,
            slug: Slug::parse(slug).unwrap(),
            password_hash: "hash".to_owned(),
            store_name: slug.to_owned(),
            store_description: None,
            whatsapp: None,
        };
        store.create_merchant(&new).await.unwrap().0.id
    }

    #[tokio::test]
    async fn test_resolve_slug() {
        let store = MemoryStore::new();
        let id = seed(&store, "acme").await;

        let (tenant, storefront) = Tenant::resolve_slug(&store, "acme").await.unwrap();
        assert_eq!(tenant.merchant_id(), id);
        assert_eq!(storefront.slug.as_str(), "acme");
    }

    #[tokio::test]
    async fn test_resolve_slug_not_found() {
        let store = MemoryStore::new();
        seed(&store, "acme").await;

        for raw in ["ACME", "acme-2", "a", "-acme", "ac me"] {
            let err = Tenant::resolve_slug(&store, raw).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_resolve_slug_inactive() {
        let store = MemoryStore::new();
        let id = seed(&store, "acme").await;

        store.set_store_active(id, false).await;
        assert!(Tenant::resolve_slug(&store, "acme").await.is_err());

        store.set_store_active(id, true).await;
        store.set_merchant_active(id, false).await;
        assert!(Tenant::resolve_slug(&store, "acme").await.is_err());
    }
}
