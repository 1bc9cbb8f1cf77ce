//! Shopping cart aggregate.
//!
//! [`Cart`] holds a snapshot of a user's lines joined with live product data.
//! Every mutation validates against that snapshot and returns the single
//! [`LineChange`] the caller must persist. The storefront loads the snapshot
//! after locking the cart row, so two concurrent requests never validate
//! against the same stale stock or quantity.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::Product;
use crate::types::{CartId, CartItemId, Money, ProductId, UserId};

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,
    #[error("cart item not found")]
    ItemNotFound,
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),
    /// `available` is how many more units fit, given what is already in the cart.
    #[error("insufficient stock, only {available} more available")]
    InsufficientStock { available: u32 },
}

/// One product in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    /// `None` until the line has been persisted.
    pub item_id: Option<CartItemId>,
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Live unit price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.product.effective_price().times(self.quantity)
    }

    /// Whether one more unit would still fit in stock.
    #[must_use]
    pub fn can_increase(&self) -> bool {
        self.quantity < self.product.stock
    }
}

/// Quantity count and price total for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CartTotals {
    /// Sum of quantities, not the number of lines.
    pub item_count: u64,
    pub total: Money,
}

/// A write the persistence layer applies after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    /// Insert a line for the product or overwrite its quantity.
    Upsert {
        product_id: ProductId,
        quantity: u32,
    },
    SetQuantity {
        item_id: CartItemId,
        quantity: u32,
    },
    Remove {
        item_id: CartItemId,
    },
    Clear,
}

/// A user's cart and its lines, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub const fn new(id: CartId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn line(&self, item_id: CartItemId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.item_id == Some(item_id))
    }

    /// Add `quantity` units of `product`, merging with an existing line.
    ///
    /// The product must be available and the combined quantity must not
    /// exceed its stock.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] if `quantity` is below 1
    /// - [`CartError::ProductNotFound`] if the product is not available
    /// - [`CartError::InsufficientStock`] if the new total exceeds stock
    pub fn add_item(&mut self, product: Product, quantity: i64) -> Result<LineChange, CartError> {
        let quantity = positive(quantity)?;
        if !product.is_purchasable() {
            return Err(CartError::ProductNotFound);
        }

        let product_id = product.id;
        let existing = self
            .lines
            .iter_mut()
            .find(|l| l.product.id == product_id);
        let current = existing.as_ref().map_or(0, |l| l.quantity);
        let wanted = current.saturating_add(quantity);
        if wanted > product.stock {
            return Err(CartError::InsufficientStock {
                available: product.stock.saturating_sub(current),
            });
        }

        match existing {
            Some(line) => {
                line.quantity = wanted;
                line.product = product;
            }
            None => self.lines.push(CartLine {
                item_id: None,
                product,
                quantity: wanted,
            }),
        }

        Ok(LineChange::Upsert {
            product_id,
            quantity: wanted,
        })
    }

    /// Replace the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// - [`CartError::ItemNotFound`] if the line is not in this cart
    /// - [`CartError::InvalidQuantity`] if `quantity` is below 1
    /// - [`CartError::InsufficientStock`] if `quantity` exceeds stock
    pub fn update_quantity(
        &mut self,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<LineChange, CartError> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item_id == Some(item_id))
            .ok_or(CartError::ItemNotFound)?;
        let quantity = positive(quantity)?;
        if quantity > line.product.stock {
            return Err(CartError::InsufficientStock {
                available: line.product.stock,
            });
        }
        line.quantity = quantity;
        Ok(LineChange::SetQuantity { item_id, quantity })
    }

    /// # Errors
    ///
    /// [`CartError::ItemNotFound`] if the line is not in this cart.
    pub fn remove_item(&mut self, item_id: CartItemId) -> Result<LineChange, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.item_id == Some(item_id))
            .ok_or(CartError::ItemNotFound)?;
        self.lines.remove(index);
        Ok(LineChange::Remove { item_id })
    }

    /// Always succeeds, even on an empty cart.
    pub fn clear(&mut self) -> LineChange {
        self.lines.clear();
        LineChange::Clear
    }

    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals {
            item_count: self.lines.iter().map(|l| u64::from(l.quantity)).sum(),
            total: self.lines.iter().map(CartLine::subtotal).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn positive(quantity: i64) -> Result<u32, CartError> {
    if quantity < 1 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    // Anything beyond u32 can never fit in stock.
    Ok(u32::try_from(quantity).unwrap_or(u32::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::product;
    use crate::types::ProductStatus;

    fn cart_with(lines: &[(i32, i32, u32, u32)]) -> Cart {
        // (item id, product id, quantity, stock)
        let mut cart = Cart::new(CartId::new(1), UserId::new(7));
        for &(item, pid, quantity, stock) in lines {
            cart.lines.push(CartLine {
                item_id: Some(CartItemId::new(item)),
                product: product(pid, 1_000, None, stock),
                quantity,
            });
        }
        cart
    }

    #[test]
    fn test_add_new_line() {
        let mut cart = cart_with(&[]);
        let change = cart.add_item(product(3, 2_500, None, 5), 2).unwrap();
        assert_eq!(
            change,
            LineChange::Upsert {
                product_id: ProductId::new(3),
                quantity: 2
            }
        );
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.totals().total, Money::from_minor(5_000));
    }

    #[test]
    fn test_add_merges_existing_line() {
        let mut cart = cart_with(&[(10, 3, 2, 5)]);
        let change = cart.add_item(product(3, 1_000, None, 5), 3).unwrap();
        assert_eq!(
            change,
            LineChange::Upsert {
                product_id: ProductId::new(3),
                quantity: 5
            }
        );
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn test_add_rejects_combined_quantity_over_stock() {
        let mut cart = cart_with(&[(10, 3, 4, 5)]);
        let err = cart.add_item(product(3, 1_000, None, 5), 2).unwrap_err();
        assert_eq!(err, CartError::InsufficientStock { available: 1 });
        assert_eq!(cart.lines[0].quantity, 4);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let mut cart = cart_with(&[]);
        let p = product(3, 1_000, None, 5);
        assert_eq!(
            cart.add_item(p.clone(), 0),
            Err(CartError::InvalidQuantity(0))
        );
        assert_eq!(cart.add_item(p, -2), Err(CartError::InvalidQuantity(-2)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_rejects_unavailable_product() {
        let mut cart = cart_with(&[]);
        let mut p = product(3, 1_000, None, 5);
        p.status = ProductStatus::Discontinued;
        assert_eq!(cart.add_item(p, 1), Err(CartError::ProductNotFound));
    }

    #[test]
    fn test_add_huge_quantity_reports_stock() {
        let mut cart = cart_with(&[]);
        let err = cart
            .add_item(product(3, 1_000, None, 5), i64::MAX)
            .unwrap_err();
        assert_eq!(err, CartError::InsufficientStock { available: 5 });
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = cart_with(&[(10, 3, 1, 5)]);
        let change = cart.update_quantity(CartItemId::new(10), 5).unwrap();
        assert_eq!(
            change,
            LineChange::SetQuantity {
                item_id: CartItemId::new(10),
                quantity: 5
            }
        );
        assert_eq!(
            cart.update_quantity(CartItemId::new(10), 6),
            Err(CartError::InsufficientStock { available: 5 })
        );
        assert_eq!(
            cart.update_quantity(CartItemId::new(10), 0),
            Err(CartError::InvalidQuantity(0))
        );
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn test_update_unknown_line() {
        let mut cart = cart_with(&[(10, 3, 1, 5)]);
        assert_eq!(
            cart.update_quantity(CartItemId::new(99), 1),
            Err(CartError::ItemNotFound)
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = cart_with(&[(10, 3, 1, 5), (11, 4, 2, 5)]);
        assert_eq!(
            cart.remove_item(CartItemId::new(10)),
            Ok(LineChange::Remove {
                item_id: CartItemId::new(10)
            })
        );
        assert_eq!(
            cart.remove_item(CartItemId::new(10)),
            Err(CartError::ItemNotFound)
        );
        assert_eq!(cart.clear(), LineChange::Clear);
        assert!(cart.is_empty());
        assert_eq!(cart.clear(), LineChange::Clear);
    }

    #[test]
    fn test_totals_use_sale_price_and_count_units() {
        let mut cart = cart_with(&[]);
        cart.add_item(product(1, 1_999, None, 10), 3).unwrap();
        cart.add_item(product(2, 10_000, Some(7_500), 10), 2)
            .unwrap();
        let totals = cart.totals();
        assert_eq!(totals.item_count, 5);
        assert_eq!(totals.total, Money::from_minor(5_997 + 15_000));
    }

    #[test]
    fn test_empty_cart_totals() {
        assert_eq!(cart_with(&[]).totals(), CartTotals::default());
    }

    #[test]
    fn test_can_increase() {
        let cart = cart_with(&[(10, 3, 4, 5), (11, 4, 5, 5)]);
        assert!(cart.lines[0].can_increase());
        assert!(!cart.lines[1].can_increase());
    }
}
