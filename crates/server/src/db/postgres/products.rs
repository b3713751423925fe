//! Product queries. Every statement filters on the tenant.

use sqlx::PgPool;

use live_commerce_core::ProductId;

use crate::db::RepositoryError;
use crate::models::{Product, ProductFilter, ProductInput};
use crate::tenant::Tenant;

/// Repository for tenant-owned products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the tenant's products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        tenant: Tenant,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(
            r"
            SELECT id, merchant_id, name, description, price, stock, category, image_url,
                   active, created_at, updated_at
            FROM products
            WHERE merchant_id = $1
              AND ($2 OR active)
              AND ($3::TEXT IS NULL OR LOWER(category) = LOWER($3))
              AND ($4::TEXT IS NULL OR name ILIKE $4 OR description ILIKE $4)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(tenant.merchant_id())
        .bind(filter.include_inactive)
        .bind(filter.category.as_deref())
        .bind(filter.search_pattern())
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Get one of the tenant's products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        tenant: Tenant,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            SELECT id, merchant_id, name, description, price, stock, category, image_url,
                   active, created_at, updated_at
            FROM products
            WHERE id = $1 AND merchant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant.merchant_id())
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get the tenant's products with the given IDs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        tenant: Tenant,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let products = sqlx::query_as::<_, Product>(
            r"
            SELECT id, merchant_id, name, description, price, stock, category, image_url,
                   active, created_at, updated_at
            FROM products
            WHERE merchant_id = $1 AND id = ANY($2)
            ORDER BY id
            ",
        )
        .bind(tenant.merchant_id())
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        tenant: Tenant,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            INSERT INTO products (merchant_id, name, description, price, stock, category,
                                  image_url, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, merchant_id, name, description, price, stock, category, image_url,
                      active, created_at, updated_at
            ",
        )
        .bind(tenant.merchant_id())
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.active)
        .fetch_one(self.pool)
        .await?;

        Ok(product)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        tenant: Tenant,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            UPDATE products
            SET name = $3, description = $4, price = $5, stock = $6, category = $7,
                image_url = $8, active = $9, updated_at = NOW()
            WHERE id = $1 AND merchant_id = $2
            RETURNING id, merchant_id, name, description, price, stock, category, image_url,
                      active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(tenant.merchant_id())
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category.as_deref())
        .bind(input.image_url.as_deref())
        .bind(input.active)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Soft delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate(&self, tenant: Tenant, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND merchant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant.merchant_id())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
