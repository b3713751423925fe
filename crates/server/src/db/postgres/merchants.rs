//! Merchant and storefront queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use live_commerce_core::{Email, MerchantId, Money, Slug, StoreId};

use crate::db::RepositoryError;
use crate::models::{Merchant, MerchantCredentials, NewMerchant, StoreSettings, Storefront};
use crate::tenant::Tenant;

#[derive(Debug, sqlx::FromRow)]
struct MerchantRow {
    id: MerchantId,
    email: String,
    name: String,
    phone: Option<String>,
    slug: String,
    country: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = RepositoryError;

    fn try_from(row: MerchantRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid slug in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            email,
            name: row.name,
            phone: row.phone,
            slug,
            country: row.country,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    merchant: MerchantRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StorefrontRow {
    store_id: StoreId,
    merchant_id: MerchantId,
    slug: String,
    name: String,
    description: Option<String>,
    logo_url: Option<String>,
    primary_color: Option<String>,
    secondary_color: Option<String>,
    whatsapp: Option<String>,
    instagram: Option<String>,
    tiktok: Option<String>,
    shipping_cost: Money,
    active: bool,
}

impl TryFrom<StorefrontRow> for Storefront {
    type Error = RepositoryError;

    fn try_from(row: StorefrontRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid store slug in database: {e}"))
        })?;
        Ok(Self {
            store_id: row.store_id,
            merchant_id: row.merchant_id,
            slug,
            name: row.name,
            description: row.description,
            logo_url: row.logo_url,
            primary_color: row.primary_color,
            secondary_color: row.secondary_color,
            whatsapp: row.whatsapp,
            instagram: row.instagram,
            tiktok: row.tiktok,
            shipping_cost: row.shipping_cost,
            active: row.active,
        })
    }
}

/// Repository for merchant accounts and storefronts.
pub struct MerchantRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MerchantRepository<'a> {
    /// Create a new merchant repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an active merchant and its password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<MerchantCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r"
            SELECT id, email, name, phone, slug, country, active, created_at, password_hash
            FROM merchants
            WHERE email = $1 AND active
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| -> Result<_, RepositoryError> {
            Ok(MerchantCredentials {
                merchant: r.merchant.try_into()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    /// Get a merchant by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, RepositoryError> {
        let row = sqlx::query_as::<_, MerchantRow>(
            r"
            SELECT id, email, name, phone, slug, country, active, created_at
            FROM merchants
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Merchant::try_from).transpose()
    }

    /// Check whether a slug is used by any merchant or store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_taken(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (SELECT 1 FROM merchants WHERE slug = $1)
                OR EXISTS (SELECT 1 FROM stores WHERE subdomain = $1)
            ",
        )
        .bind(slug.as_str())
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }

    /// Create a merchant and its store in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        new: &NewMerchant,
    ) -> Result<(Merchant, Storefront), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let merchant = sqlx::query_as::<_, MerchantRow>(
            r"
            INSERT INTO merchants (email, name, phone, slug, password_hash, country)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, name, phone, slug, country, active, created_at
            ",
        )
        .bind(new.email.as_str())
        .bind(&new.name)
        .bind(new.phone.as_deref())
        .bind(new.slug.as_str())
        .bind(&new.password_hash)
        .bind(new.country.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        let store = sqlx::query_as::<_, StorefrontRow>(
            r"
            INSERT INTO stores (merchant_id, name, description, whatsapp, subdomain)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id AS store_id, merchant_id, subdomain AS slug, name, description,
                      logo_url, primary_color, secondary_color, whatsapp, instagram, tiktok,
                      shipping_cost, active
            ",
        )
        .bind(merchant.id)
        .bind(&new.store_name)
        .bind(new.store_description.as_deref())
        .bind(new.whatsapp.as_ref().map(|p| p.as_str()))
        .bind(new.slug.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        Ok((merchant.try_into()?, store.try_into()?))
    }

    /// Resolve an active storefront of an active merchant by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn storefront_by_slug(
        &self,
        slug: &Slug,
    ) -> Result<Option<Storefront>, RepositoryError> {
        let row = sqlx::query_as::<_, StorefrontRow>(
            r"
            SELECT s.id AS store_id, s.merchant_id, s.subdomain AS slug, s.name, s.description,
                   s.logo_url, s.primary_color, s.secondary_color, s.whatsapp, s.instagram,
                   s.tiktok, s.shipping_cost, s.active
            FROM stores s
            JOIN merchants m ON m.id = s.merchant_id
            WHERE s.subdomain = $1 AND s.active AND m.active
            ",
        )
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Storefront::try_from).transpose()
    }

    /// Get the tenant's storefront.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn storefront(&self, tenant: Tenant) -> Result<Option<Storefront>, RepositoryError> {
        let row = sqlx::query_as::<_, StorefrontRow>(
            r"
            SELECT id AS store_id, merchant_id, subdomain AS slug, name, description,
                   logo_url, primary_color, secondary_color, whatsapp, instagram, tiktok,
                   shipping_cost, active
            FROM stores
            WHERE merchant_id = $1
            ",
        )
        .bind(tenant.merchant_id())
        .fetch_optional(self.pool)
        .await?;

        row.map(Storefront::try_from).transpose()
    }

    /// Update name, WhatsApp contact and shipping cost.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_settings(
        &self,
        tenant: Tenant,
        settings: &StoreSettings,
    ) -> Result<Option<Storefront>, RepositoryError> {
        let row = sqlx::query_as::<_, StorefrontRow>(
            r"
            UPDATE stores
            SET name = $2, whatsapp = $3, shipping_cost = $4, updated_at = NOW()
            WHERE merchant_id = $1
            RETURNING id AS store_id, merchant_id, subdomain AS slug, name, description,
                      logo_url, primary_color, secondary_color, whatsapp, instagram, tiktok,
                      shipping_cost, active
            ",
        )
        .bind(tenant.merchant_id())
        .bind(&settings.name)
        .bind(settings.whatsapp.as_ref().map(|p| p.as_str()))
        .bind(settings.shipping_cost)
        .fetch_optional(self.pool)
        .await?;

        row.map(Storefront::try_from).transpose()
    }
}

/// Translate unique violations on merchant and store keys into conflicts.
fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let message = match db_err.constraint() {
            Some("merchants_email_key") => "email already registered",
            Some("merchants_slug_key" | "stores_subdomain_key") => "slug already taken",
            _ => "merchant already exists",
        };
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}
