//! Cart operations for the logged-in user.
//!
//! Each mutation locks the user's cart row, validates against the locked
//! snapshot with the core cart rules, then persists the resulting change in
//! the same transaction.

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use gamerly_core::{
    Cart, CartError, CartItemId, CartLine, CartTotals, CategoryId, Money, ProductId, UserId,
};

use crate::db::{CartRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One cart line as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub item_id: Option<CartItemId>,
    pub product_id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    pub can_increase: bool,
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        Self {
            item_id: line.item_id,
            product_id: line.product.id,
            name: line.product.name.clone(),
            category_id: line.product.category_id,
            category_name: line.product.category_name.clone(),
            unit_price: line.product.effective_price(),
            quantity: line.quantity,
            subtotal: line.subtotal(),
            can_increase: line.can_increase(),
        }
    }
}

/// A cart with its lines and totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines.iter().map(CartItemView::from).collect(),
            totals: cart.totals(),
        }
    }
}

pub struct CartService<'a> {
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
        }
    }

    /// The user's cart with live prices.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Repository` if a query fails.
    pub async fn cart(&self, user_id: UserId) -> Result<Cart, CartServiceError> {
        Ok(self.carts.load(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `CartServiceError::Repository` if a query fails.
    pub async fn totals(&self, user_id: UserId) -> Result<CartTotals, CartServiceError> {
        Ok(self.cart(user_id).await?.totals())
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product does not exist or
    /// is not available, `CartError::InvalidQuantity` for a quantity below 1,
    /// and `CartError::InsufficientStock` if the cart would exceed stock.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, CartServiceError> {
        let mut locked = self.carts.lock(user_id).await?;
        let product = locked
            .product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        let change = locked.cart.add_item(product, quantity)?;
        Ok(locked.commit(change).await?)
    }

    /// Overwrite the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in this user's
    /// cart, `CartError::InvalidQuantity` for a quantity below 1, and
    /// `CartError::InsufficientStock` if it exceeds stock.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<Cart, CartServiceError> {
        let mut locked = self.carts.lock(user_id).await?;
        let change = locked.cart.update_quantity(item_id, quantity)?;
        Ok(locked.commit(change).await?)
    }

    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in this user's
    /// cart.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Cart, CartServiceError> {
        let mut locked = self.carts.lock(user_id).await?;
        let change = locked.cart.remove_item(item_id)?;
        Ok(locked.commit(change).await?)
    }

    /// # Errors
    ///
    /// Returns `CartServiceError::Repository` if a write fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, CartServiceError> {
        let mut locked = self.carts.lock(user_id).await?;
        let change = locked.cart.clear();
        Ok(locked.commit(change).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gamerly_core::{CartId, Product, ProductStatus};

    fn line(item: i32, price: i64, sale: Option<i64>, quantity: u32, stock: u32) -> CartLine {
        CartLine {
            item_id: Some(CartItemId::new(item)),
            product: Product {
                id: ProductId::new(item * 10),
                name: format!("Game {item}"),
                description: String::new(),
                price: Money::from_minor(price),
                sale_price: sale.map(Money::from_minor),
                category_id: CategoryId::new(1),
                category_name: "Games".to_owned(),
                stock,
                status: ProductStatus::Available,
                featured: false,
                created_by: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            quantity,
        }
    }

    #[test]
    fn test_item_view_uses_effective_price() {
        let view = CartItemView::from(&line(1, 5_990, Some(4_990), 2, 5));
        assert_eq!(view.unit_price, Money::from_minor(4_990));
        assert_eq!(view.subtotal, Money::from_minor(9_980));
        assert_eq!(view.product_id, ProductId::new(10));
        assert!(view.can_increase);
    }

    #[test]
    fn test_cart_view_totals() {
        let cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            lines: vec![line(1, 1_999, None, 3, 3), line(2, 500, None, 1, 9)],
        };
        let view = CartView::from(&cart);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.totals.item_count, 4);
        assert_eq!(view.totals.total, Money::from_minor(6_497));
        assert!(view.items.first().is_some_and(|i| !i.can_increase));
    }

    #[test]
    fn test_cart_view_json_is_flat() {
        let cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            lines: vec![line(1, 1_000, None, 2, 5)],
        };
        let json = serde_json::to_value(CartView::from(&cart)).unwrap_or_default();
        assert_eq!(json["item_count"], 2);
        assert_eq!(json["total"], "20.00");
        assert_eq!(json["items"][0]["subtotal"], "20.00");
    }
}
