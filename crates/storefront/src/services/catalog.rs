//! Catalog browsing and administration.
//!
//! Customers only ever see `available` products and active categories.
//! Administrators see everything and may edit the catalog.

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use gamerly_core::catalog::PRODUCTS_PER_PAGE;
use gamerly_core::{
    Category, CategoryDraft, CategoryId, Money, PageInfo, Product, ProductDraft, ProductId,
    ProductStatus, UserId, ValidationError,
};

use crate::db::catalog::{InventoryStats, ProductFilter, StoreStats};
use crate::db::{CatalogRepository, RepositoryError};

/// Related products shown next to a product.
pub const RELATED_LIMIT: i64 = 4;
/// Products in the featured listing.
pub const FEATURED_LIMIT: i64 = 6;
/// Newest products on the admin dashboard.
pub const LATEST_LIMIT: i64 = 10;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Who is looking at the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Public,
    Admin,
}

impl Audience {
    #[must_use]
    pub const fn for_admin(is_admin: bool) -> Self {
        if is_admin { Self::Admin } else { Self::Public }
    }

    const fn sees_everything(self) -> bool {
        matches!(self, Self::Admin)
    }

    fn can_see(self, product: &Product) -> bool {
        self.sees_everything() || product.status == ProductStatus::Available
    }
}

/// A product with its current pricing and others from its category.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub effective_price: Money,
    pub discount_percent: u32,
    pub in_stock: bool,
    pub related: Vec<Product>,
}

impl ProductDetail {
    #[must_use]
    pub fn new(product: Product, related: Vec<Product>) -> Self {
        Self {
            effective_price: product.effective_price(),
            discount_percent: product.discount_percent(),
            in_stock: product.in_stock(),
            product,
            related,
        }
    }
}

/// One page of the customer product listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: PageInfo,
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub stats: InventoryStats,
    pub latest_products: Vec<Product>,
    pub categories: Vec<Category>,
}

/// Lenient `?category=` parsing: anything that is not an id means no filter.
#[must_use]
pub fn parse_category(raw: Option<&str>) -> Option<CategoryId> {
    raw.and_then(|v| v.trim().parse().ok())
}

/// Lenient `?featured=` parsing.
#[must_use]
pub fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1" | "yes") => Some(true),
        Some("false" | "0" | "no") => Some(false),
        _ => None,
    }
}

pub struct CatalogService<'a> {
    catalog: CatalogRepository<'a>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            catalog: CatalogRepository::new(pool),
        }
    }

    // =========================================================================
    // Browsing
    // =========================================================================

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist or is
    /// hidden from `audience`.
    pub async fn product(&self, id: ProductId, audience: Audience) -> Result<Product, CatalogError> {
        self.catalog
            .get_product(id)
            .await?
            .filter(|p| audience.can_see(p))
            .ok_or(CatalogError::NotFound)
    }

    /// Public product page: an available product and up to four related ones.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` unless the product is available.
    #[instrument(skip(self))]
    pub async fn product_detail(&self, id: ProductId) -> Result<ProductDetail, CatalogError> {
        let product = self.product(id, Audience::Public).await?;
        let related = self.catalog.related_products(&product, RELATED_LIMIT).await?;
        Ok(ProductDetail::new(product, related))
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn products(
        &self,
        audience: Audience,
        category: Option<CategoryId>,
        featured: Option<bool>,
    ) -> Result<Vec<Product>, CatalogError> {
        let filter = ProductFilter {
            category,
            featured,
            available_only: !audience.sees_everything(),
        };
        Ok(self.catalog.list_products(filter, None).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        let filter = ProductFilter {
            featured: Some(true),
            available_only: true,
            ..ProductFilter::default()
        };
        Ok(self.catalog.list_products(filter, Some(FEATURED_LIMIT)).await?)
    }

    /// Available products, [`PRODUCTS_PER_PAGE`] at a time.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if a query fails.
    pub async fn browse(
        &self,
        page: Option<&str>,
        category: Option<CategoryId>,
    ) -> Result<ProductPage, CatalogError> {
        let filter = ProductFilter {
            category,
            available_only: true,
            ..ProductFilter::default()
        };
        let total = self.catalog.count_products(filter).await?;
        let page = PageInfo::resolve(page, total, PRODUCTS_PER_PAGE);
        let products = self.catalog.page_products(filter, &page).await?;
        Ok(ProductPage { products, page })
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn categories(&self, audience: Audience) -> Result<Vec<Category>, CatalogError> {
        Ok(self
            .catalog
            .list_categories(!audience.sees_everything())
            .await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the category does not exist or is
    /// inactive and hidden from `audience`.
    pub async fn category(
        &self,
        id: CategoryId,
        audience: Audience,
    ) -> Result<Category, CatalogError> {
        self.catalog
            .get_category(id)
            .await?
            .filter(|c| audience.sees_everything() || c.active)
            .ok_or(CatalogError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn store_stats(&self) -> Result<StoreStats, CatalogError> {
        Ok(self.catalog.store_stats().await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if a query fails.
    pub async fn admin_overview(&self) -> Result<AdminOverview, CatalogError> {
        let stats = self.catalog.inventory_stats().await?;
        let latest_products = self
            .catalog
            .list_products(ProductFilter::default(), Some(LATEST_LIMIT))
            .await?;
        let categories = self.catalog.list_categories(false).await?;
        Ok(AdminOverview {
            stats,
            latest_products,
            categories,
        })
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if the draft is invalid or names a
    /// category that does not exist.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(
        &self,
        draft: ProductDraft,
        created_by: UserId,
    ) -> Result<Product, CatalogError> {
        let input = draft.validate()?;
        self.require_category(input.category_id).await?;
        Ok(self.catalog.create_product(&input, Some(created_by)).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist and
    /// `CatalogError::Validation` if the draft is invalid.
    #[instrument(skip(self, draft))]
    pub async fn update_product(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Product, CatalogError> {
        let input = draft.validate()?;
        self.require_category(input.category_id).await?;
        Ok(self.catalog.update_product(id, &input).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        Ok(self.catalog.delete_product(id).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if the name is blank or taken.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category, CatalogError> {
        let draft = draft.validate()?;
        self.catalog
            .create_category(&draft)
            .await
            .map_err(category_conflict)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the category does not exist and
    /// `CatalogError::Validation` if the name is blank or taken.
    #[instrument(skip(self, draft))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> Result<Category, CatalogError> {
        let draft = draft.validate()?;
        self.catalog
            .update_category(id, &draft)
            .await
            .map_err(category_conflict)
    }

    /// Delete a category together with its products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the category does not exist.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), CatalogError> {
        Ok(self.catalog.delete_category(id).await?)
    }

    async fn require_category(&self, id: CategoryId) -> Result<(), CatalogError> {
        match self.catalog.get_category(id).await? {
            Some(_) => Ok(()),
            None => Err(ValidationError::UnknownCategory.into()),
        }
    }
}

fn category_conflict(err: RepositoryError) -> CatalogError {
    match err {
        RepositoryError::Conflict(_) => ValidationError::CategoryNameTaken.into(),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category_is_lenient() {
        assert_eq!(parse_category(Some("3")), Some(CategoryId::new(3)));
        assert_eq!(parse_category(Some(" 7 ")), Some(CategoryId::new(7)));
        assert_eq!(parse_category(Some("consoles")), None);
        assert_eq!(parse_category(None), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(Some("true")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some("maybe")), None);
        assert_eq!(parse_flag(None), None);
    }

    #[test]
    fn test_category_conflict_is_validation_error() {
        let err = category_conflict(RepositoryError::Conflict("category name".to_owned()));
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::CategoryNameTaken)
        ));
        assert!(matches!(
            category_conflict(RepositoryError::NotFound),
            CatalogError::NotFound
        ));
    }

    fn controller() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Controller".to_owned(),
            description: String::new(),
            price: Money::from_minor(4_990),
            sale_price: None,
            category_id: CategoryId::new(1),
            category_name: "Accessories".to_owned(),
            stock: 3,
            status: ProductStatus::Available,
            featured: false,
            created_by: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_public_audience_hides_unavailable() {
        let mut product = controller();
        assert!(Audience::Public.can_see(&product));
        product.status = ProductStatus::Discontinued;
        assert!(!Audience::Public.can_see(&product));
        assert!(Audience::Admin.can_see(&product));
    }

    #[test]
    fn test_detail_carries_sale_pricing() {
        let mut product = controller();
        product.sale_price = Some(Money::from_minor(3_990));
        let json = serde_json::to_value(ProductDetail::new(product, Vec::new())).unwrap();
        assert_eq!(json["effective_price"], "39.90");
        assert_eq!(json["discount_percent"], 20);
        assert_eq!(json["in_stock"], true);
        assert_eq!(json["product"]["price"], "49.90");
    }
}
