//! Cart persistence.
//!
//! Mutations go through [`CartRepository::lock`], which opens a transaction
//! and takes a row lock on the user's cart before reading its lines. The
//! returned [`LockedCart`] applies a [`LineChange`] and commits.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use gamerly_core::{Cart, CartId, CartItemId, CartLine, LineChange, Product, ProductId, UserId};

use super::RepositoryError;
use super::catalog::{PRODUCT_COLUMNS, ProductRow};

#[derive(sqlx::FromRow)]
struct LineRow {
    item_id: CartItemId,
    quantity: i32,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<LineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "cart item {} has quantity {}",
                row.item_id, row.quantity
            ))
        })?;
        Ok(Self {
            item_id: Some(row.item_id),
            product: Product::try_from(row.product)?,
            quantity,
        })
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read a user's cart, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn load(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let cart_id = ensure_cart(&mut conn, user_id).await?;
        load_lines(&mut conn, cart_id, user_id).await
    }

    /// Lock a user's cart for a mutation.
    ///
    /// The lock is held until the returned [`LockedCart`] is committed or
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn lock(&self, user_id: UserId) -> Result<LockedCart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_cart(&mut tx, user_id).await?;

        let cart_id = sqlx::query_scalar::<_, CartId>(
            "SELECT id FROM storefront.cart WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let cart = load_lines(&mut tx, cart_id, user_id).await?;
        Ok(LockedCart { tx, cart })
    }
}

/// A cart snapshot read under a row lock.
pub struct LockedCart {
    tx: Transaction<'static, Postgres>,
    pub cart: Cart,
}

impl LockedCart {
    /// Load a product inside the locked transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        super::catalog::fetch_product(&mut self.tx, id).await
    }

    /// Persist `change`, commit, and return the cart as stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails. Nothing is
    /// committed in that case.
    pub async fn commit(mut self, change: LineChange) -> Result<Cart, RepositoryError> {
        let cart_id = self.cart.id;
        match change {
            LineChange::Upsert {
                product_id,
                quantity,
            } => {
                sqlx::query(
                    "INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
                )
                .bind(cart_id)
                .bind(product_id)
                .bind(quantity_column(quantity))
                .execute(&mut *self.tx)
                .await?;
            }
            LineChange::SetQuantity { item_id, quantity } => {
                sqlx::query(
                    "UPDATE storefront.cart_item SET quantity = $3 WHERE id = $1 AND cart_id = $2",
                )
                .bind(item_id)
                .bind(cart_id)
                .bind(quantity_column(quantity))
                .execute(&mut *self.tx)
                .await?;
            }
            LineChange::Remove { item_id } => {
                sqlx::query("DELETE FROM storefront.cart_item WHERE id = $1 AND cart_id = $2")
                    .bind(item_id)
                    .bind(cart_id)
                    .execute(&mut *self.tx)
                    .await?;
            }
            LineChange::Clear => {
                sqlx::query("DELETE FROM storefront.cart_item WHERE cart_id = $1")
                    .bind(cart_id)
                    .execute(&mut *self.tx)
                    .await?;
            }
        }

        sqlx::query("UPDATE storefront.cart SET updated_at = now() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await?;

        // Re-read so new lines carry their item ids.
        let cart = load_lines(&mut self.tx, cart_id, self.cart.user_id).await?;
        self.tx.commit().await?;
        Ok(cart)
    }
}

/// Create the cart for a user if it does not exist yet.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ensure_cart(conn: &mut PgConnection, user_id: UserId) -> Result<CartId, RepositoryError> {
    let id = sqlx::query_scalar::<_, CartId>(
        "INSERT INTO storefront.cart (user_id) VALUES ($1)
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
         RETURNING id",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

async fn load_lines(
    conn: &mut PgConnection,
    cart_id: CartId,
    user_id: UserId,
) -> Result<Cart, RepositoryError> {
    let rows = sqlx::query_as::<_, LineRow>(&format!(
        "SELECT i.id AS item_id, i.quantity, {PRODUCT_COLUMNS}
         FROM storefront.cart_item i
         JOIN storefront.product p ON p.id = i.product_id
         JOIN storefront.category c ON c.id = p.category_id
         WHERE i.cart_id = $1
         ORDER BY i.added_at, i.id"
    ))
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    let lines = rows
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart {
        id: cart_id,
        user_id,
        lines,
    })
}

/// Quantities are bounded by stock, which fits `INTEGER`.
fn quantity_column(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}
