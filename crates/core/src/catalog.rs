//! Catalog records and pricing rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Money, ProductId, ProductStatus, UserId};
use crate::validation::ValidationError;

/// Products shown per dashboard page.
pub const PRODUCTS_PER_PAGE: u32 = 12;

/// A product as stored, joined with its category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub category_id: CategoryId,
    pub category_name: String,
    pub stock: u32,
    pub status: ProductStatus,
    pub featured: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The sale price when it undercuts the list price, otherwise the list price.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    /// Whole-number discount, rounded down. Zero when no sale applies.
    #[must_use]
    pub fn discount_percent(&self) -> u32 {
        let list = i128::from(self.price.minor());
        let effective = i128::from(self.effective_price().minor());
        if list <= 0 || effective >= list {
            return 0;
        }
        u32::try_from((list - effective) * 100 / list).unwrap_or(0)
    }

    /// Whether the product can be added to a cart at all.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Available
    }

    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock > 0 && self.is_purchasable()
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Available products in this category.
    pub product_count: i64,
}

/// Product fields as submitted by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
}

/// A [`ProductDraft`] that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub category_id: CategoryId,
    pub stock: u32,
    pub status: ProductStatus,
    pub featured: bool,
}

impl ProductDraft {
    /// # Errors
    ///
    /// Rejects a blank name, negative prices, and stock that is negative or
    /// larger than the database column can hold.
    pub fn validate(self) -> Result<ProductInput, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if self.price.is_negative() {
            return Err(ValidationError::Negative { field: "price" });
        }
        if self.sale_price.is_some_and(Money::is_negative) {
            return Err(ValidationError::Negative {
                field: "sale_price",
            });
        }
        if self.stock < 0 {
            return Err(ValidationError::Negative { field: "stock" });
        }
        let stock = u32::try_from(self.stock)
            .ok()
            .filter(|s| i32::try_from(*s).is_ok())
            .ok_or(ValidationError::TooLarge { field: "stock" })?;

        Ok(ProductInput {
            name: name.to_owned(),
            description: self.description.trim().to_owned(),
            price: self.price,
            sale_price: self.sale_price,
            category_id: self.category_id,
            stock,
            status: self.status,
            featured: self.featured,
        })
    }
}

/// Category fields as submitted by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

impl CategoryDraft {
    /// # Errors
    ///
    /// Rejects a blank name.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.name = self.name.trim().to_owned();
        if self.name.is_empty() {
            return Err(ValidationError::Required("name"));
        }
        self.description = self.description.trim().to_owned();
        Ok(self)
    }
}

/// Resolved position within a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: u32,
    pub total_pages: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageInfo {
    /// Resolve a raw `?page=` value against the listing size.
    ///
    /// Anything that is not a positive integer falls back to page 1, and
    /// numbers past the end clamp to the last page. An empty listing still
    /// has one (empty) page.
    #[must_use]
    pub fn resolve(requested: Option<&str>, total_items: u64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let total_pages = u32::try_from(total_items.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);
        let number = requested
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .map_or(1, |n| n.min(total_pages));

        Self {
            number,
            total_pages,
            per_page,
            total_items,
            has_previous: number > 1,
            has_next: number < total_pages,
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.per_page)
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: i32, price: i64, sale: Option<i64>, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::from_minor(price),
            sale_price: sale.map(Money::from_minor),
            category_id: CategoryId::new(1),
            category_name: "Consoles".to_owned(),
            stock,
            status: ProductStatus::Available,
            featured: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::product;
    use super::*;

    #[test]
    fn test_effective_price_uses_lower_sale_price() {
        assert_eq!(
            product(1, 10_000, Some(7_500), 1).effective_price(),
            Money::from_minor(7_500)
        );
    }

    #[test]
    fn test_effective_price_ignores_higher_or_equal_sale_price() {
        assert_eq!(
            product(1, 10_000, Some(12_000), 1).effective_price(),
            Money::from_minor(10_000)
        );
        assert_eq!(
            product(1, 10_000, Some(10_000), 1).effective_price(),
            Money::from_minor(10_000)
        );
        assert_eq!(
            product(1, 10_000, None, 1).effective_price(),
            Money::from_minor(10_000)
        );
    }

    #[test]
    fn test_discount_percent_rounds_down() {
        assert_eq!(product(1, 3_000, Some(2_000), 1).discount_percent(), 33);
        assert_eq!(product(1, 3_000, Some(4_000), 1).discount_percent(), 0);
        assert_eq!(product(1, 0, None, 1).discount_percent(), 0);
    }

    #[test]
    fn test_in_stock_needs_stock_and_available_status() {
        let mut p = product(1, 100, None, 3);
        assert!(p.in_stock());
        p.stock = 0;
        assert!(!p.in_stock());
        p.stock = 3;
        p.status = ProductStatus::Discontinued;
        assert!(!p.in_stock());
    }

    fn draft() -> ProductDraft {
        serde_json::from_value(serde_json::json!({
            "name": "  PS5  ",
            "price": "499.99",
            "category_id": 2,
            "stock": 4
        }))
        .unwrap()
    }

    #[test]
    fn test_product_draft_defaults_and_trims() {
        let input = draft().validate().unwrap();
        assert_eq!(input.name, "PS5");
        assert_eq!(input.price, Money::from_minor(49_999));
        assert_eq!(input.status, ProductStatus::Available);
        assert!(!input.featured);
        assert_eq!(input.stock, 4);
    }

    #[test]
    fn test_product_draft_rejections() {
        let mut blank = draft();
        blank.name = "  ".into();
        assert_eq!(blank.validate(), Err(ValidationError::Required("name")));

        let mut negative = draft();
        negative.stock = -1;
        assert_eq!(
            negative.validate(),
            Err(ValidationError::Negative { field: "stock" })
        );

        let mut cheap = draft();
        cheap.sale_price = Some(Money::from_minor(-5));
        assert_eq!(
            cheap.validate(),
            Err(ValidationError::Negative {
                field: "sale_price"
            })
        );

        let mut huge = draft();
        huge.stock = i64::from(i32::MAX) + 1;
        assert_eq!(
            huge.validate(),
            Err(ValidationError::TooLarge { field: "stock" })
        );
    }

    #[test]
    fn test_category_draft_defaults_active() {
        let draft: CategoryDraft =
            serde_json::from_value(serde_json::json!({ "name": " Retro " })).unwrap();
        let draft = draft.validate().unwrap();
        assert!(draft.active);
        assert_eq!(draft.name, "Retro");
    }

    #[test]
    fn test_page_resolution() {
        let page = PageInfo::resolve(Some("2"), 30, 12);
        assert_eq!(page.number, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset(), 12);
        assert!(page.has_previous && page.has_next);

        assert_eq!(PageInfo::resolve(Some("abc"), 30, 12).number, 1);
        assert_eq!(PageInfo::resolve(Some("0"), 30, 12).number, 1);
        assert_eq!(PageInfo::resolve(Some("99"), 30, 12).number, 3);
        assert_eq!(PageInfo::resolve(None, 0, 12).total_pages, 1);
    }
}
