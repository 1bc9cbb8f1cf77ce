//! Cart route handlers (requires auth).
//!
//! Every mutation answers with the updated `item_count` and `total`.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gamerly_core::{Cart, CartItemId, CartTotals, Money, ProductId};

use crate::error::add_breadcrumb;
use crate::middleware::RequireAuth;
use crate::routes::{ApiResponse, ApiResult};
use crate::services::CartService;
use crate::services::cart::CartView;
use crate::state::AppState;

const fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Totals after a mutation, plus the touched line's subtotal on update.
#[derive(Debug, Serialize)]
pub struct CartChanged {
    #[serde(flatten)]
    pub totals: CartTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Money>,
}

impl From<&Cart> for CartChanged {
    fn from(cart: &Cart) -> Self {
        Self {
            totals: cart.totals(),
            subtotal: None,
        }
    }
}

fn line_subtotal(cart: &Cart, item_id: CartItemId) -> Option<Money> {
    cart.line(item_id).map(gamerly_core::CartLine::subtotal)
}

/// GET /cart
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<CartView> {
    let cart = CartService::new(state.pool()).cart(user.id).await?;
    Ok(ApiResponse::ok("Cart loaded", CartView::from(&cart)))
}

/// POST /cart/add
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<AddToCartRequest>,
) -> ApiResult<CartChanged> {
    let cart = CartService::new(state.pool())
        .add(user.id, req.product_id, req.quantity)
        .await?;

    let product_id = req.product_id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));
    Ok(ApiResponse::ok("Added to cart", CartChanged::from(&cart)))
}

/// POST /cart/items/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
    Json(req): Json<UpdateQuantityRequest>,
) -> ApiResult<CartChanged> {
    let cart = CartService::new(state.pool())
        .update(user.id, item_id, req.quantity)
        .await?;

    Ok(ApiResponse::ok(
        "Quantity updated",
        CartChanged {
            subtotal: line_subtotal(&cart, item_id),
            ..CartChanged::from(&cart)
        },
    ))
}

/// DELETE /cart/items/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> ApiResult<CartChanged> {
    let cart = CartService::new(state.pool())
        .remove(user.id, item_id)
        .await?;
    Ok(ApiResponse::ok("Item removed", CartChanged::from(&cart)))
}

/// POST /cart/clear
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<CartChanged> {
    let cart = CartService::new(state.pool()).clear(user.id).await?;
    Ok(ApiResponse::ok("Cart cleared", CartChanged::from(&cart)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gamerly_core::{CartId, CartLine, CategoryId, Product, ProductStatus, UserId};

    fn cart() -> Cart {
        let product = Product {
            id: ProductId::new(1),
            name: "Arcade Stick".to_owned(),
            description: String::new(),
            price: Money::from_minor(1_500),
            sale_price: None,
            category_id: CategoryId::new(1),
            category_name: "Accessories".to_owned(),
            stock: 10,
            status: ProductStatus::Available,
            featured: false,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            lines: vec![CartLine {
                item_id: Some(CartItemId::new(5)),
                product,
                quantity: 2,
            }],
        }
    }

    #[test]
    fn test_add_defaults_to_one_unit() {
        let req: AddToCartRequest = serde_json::from_str(r#"{"product_id": 3}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert_eq!(req.product_id, ProductId::new(3));
    }

    #[test]
    fn test_update_response_carries_subtotal() {
        let cart = cart();
        let changed = CartChanged {
            subtotal: line_subtotal(&cart, CartItemId::new(5)),
            ..CartChanged::from(&cart)
        };
        let json = serde_json::to_value(changed).unwrap();
        assert_eq!(json["item_count"], 2);
        assert_eq!(json["total"], "30.00");
        assert_eq!(json["subtotal"], "30.00");
    }

    #[test]
    fn test_mutation_response_omits_subtotal() {
        let json = serde_json::to_value(CartChanged::from(&cart())).unwrap();
        assert!(json.get("subtotal").is_none());
    }
}
