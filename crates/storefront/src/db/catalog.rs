//! Product and category repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use gamerly_core::catalog::PageInfo;
use gamerly_core::{
    Category, CategoryDraft, CategoryId, Money, Product, ProductId, ProductInput, ProductStatus,
    UserId,
};

use super::{RepositoryError, conflict_on_unique};

/// Columns of [`ProductRow`], selected from `storefront.product p` joined
/// with `storefront.category c`.
pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, \
     p.price_cents AS price, p.sale_cents AS sale_price, p.category_id, \
     c.name AS category_name, p.stock, p.status, p.featured, p.created_by, \
     p.created_at, p.updated_at";

const PRODUCT_FROM: &str =
    "FROM storefront.product p JOIN storefront.category c ON c.id = p.category_id";

const CATEGORY_SELECT: &str = "SELECT c.id, c.name, c.description, c.active, c.created_at,
        (SELECT COUNT(*) FROM storefront.product p
         WHERE p.category_id = c.id AND p.status = 'available') AS product_count
     FROM storefront.category c";

const FILTER_CLAUSE: &str = "($1::int IS NULL OR p.category_id = $1)
       AND ($2::bool IS NULL OR p.featured = $2)
       AND (NOT $3 OR p.status = 'available')";

/// A product row before the stock column is checked.
#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Money,
    sale_price: Option<Money>,
    category_id: CategoryId,
    category_name: String,
    stock: i32,
    status: ProductStatus,
    featured: bool,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "product {} has negative stock {}",
                row.id, row.stock
            ))
        })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            sale_price: row.sale_price,
            category_id: row.category_id,
            category_name: row.category_name,
            stock,
            status: row.status,
            featured: row.featured,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Which products a listing includes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub featured: Option<bool>,
    /// Restrict to `available` products.
    pub available_only: bool,
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct InventoryStats {
    pub total_products: i64,
    pub available_products: i64,
    pub zero_stock_products: i64,
}

/// Public store counters.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct StoreStats {
    pub available_products: i64,
    pub active_categories: i64,
    pub featured_products: i64,
}

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_FROM}
             WHERE {FILTER_CLAUSE}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $4"
        ))
        .bind(filter.category)
        .bind(filter.featured)
        .bind(filter.available_only)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        into_products(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_products(&self, filter: ProductFilter) -> Result<u64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM storefront.product p WHERE {FILTER_CLAUSE}"
        ))
        .bind(filter.category)
        .bind(filter.featured)
        .bind(filter.available_only)
        .fetch_one(self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// One page of products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn page_products(
        &self,
        filter: ProductFilter,
        page: &PageInfo,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_FROM}
             WHERE {FILTER_CLAUSE}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.category)
        .bind(filter.featured)
        .bind(filter.available_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;
        into_products(rows)
    }

    /// Other available products in the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related_products(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} {PRODUCT_FROM}
             WHERE p.category_id = $1 AND p.status = 'available' AND p.id <> $2
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $3"
        ))
        .bind(product.category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        into_products(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn inventory_stats(&self) -> Result<InventoryStats, RepositoryError> {
        let stats = sqlx::query_as::<_, InventoryStats>(
            "SELECT COUNT(*) AS total_products,
                    COUNT(*) FILTER (WHERE status = 'available') AS available_products,
                    COUNT(*) FILTER (WHERE stock = 0) AS zero_stock_products
             FROM storefront.product",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn store_stats(&self) -> Result<StoreStats, RepositoryError> {
        let stats = sqlx::query_as::<_, StoreStats>(
            "SELECT
                (SELECT COUNT(*) FROM storefront.product WHERE status = 'available')
                    AS available_products,
                (SELECT COUNT(*) FROM storefront.category WHERE active)
                    AS active_categories,
                (SELECT COUNT(*) FROM storefront.product
                 WHERE status = 'available' AND featured) AS featured_products",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_product(
        &self,
        input: &ProductInput,
        created_by: Option<UserId>,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "WITH p AS (
                INSERT INTO storefront.product
                    (name, description, price_cents, sale_cents, category_id,
                     stock, status, featured, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
             )
             SELECT {PRODUCT_COLUMNS} FROM p JOIN storefront.category c ON c.id = p.category_id"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.category_id)
        .bind(stock_column(input.stock))
        .bind(input.status)
        .bind(input.featured)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;

        let product = Product::try_from(row)?;
        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "WITH p AS (
                UPDATE storefront.product SET
                    name = $2, description = $3, price_cents = $4, sale_cents = $5,
                    category_id = $6, stock = $7, status = $8, featured = $9,
                    updated_at = now()
                WHERE id = $1
                RETURNING *
             )
             SELECT {PRODUCT_COLUMNS} FROM p JOIN storefront.category c ON c.id = p.category_id"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.category_id)
        .bind(stock_column(input.stock))
        .bind(input.status)
        .bind(input.featured)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }

    /// Id of the oldest product with this name in a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_product_id(
        &self,
        name: &str,
        category_id: CategoryId,
    ) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM storefront.product WHERE name = $1 AND category_id = $2
             ORDER BY id LIMIT 1",
        )
        .bind(name)
        .bind(category_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Categories by name, with their count of available products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self, active_only: bool) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "{CATEGORY_SELECT} WHERE (NOT $1 OR c.active) ORDER BY c.name"
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let category =
            sqlx::query_as::<_, Category>(&format!("{CATEGORY_SELECT} WHERE c.name = $1"))
                .bind(name)
                .fetch_optional(self.pool)
                .await?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Category, RepositoryError> {
        let id = sqlx::query_scalar::<_, CategoryId>(
            "INSERT INTO storefront.category (name, description, active)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category name"))?;

        tracing::info!(category_id = %id, name = %draft.name, "Category created");
        self.get_category(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn update_category(
        &self,
        id: CategoryId,
        draft: &CategoryDraft,
    ) -> Result<Category, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.category SET name = $2, description = $3, active = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.active)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("category name"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_category(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a category and, by cascade, its products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }
}

/// Load one product on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fetch_product(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} {PRODUCT_FROM} WHERE p.id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    row.map(Product::try_from).transpose()
}

/// Stock is validated to fit `INTEGER` before it reaches the repository.
fn stock_column(stock: u32) -> i32 {
    i32::try_from(stock).unwrap_or(i32::MAX)
}
