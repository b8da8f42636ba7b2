//! Cart aggregate: one cart per user, one line per (cart, product).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::inventory;
use crate::domain::product::Product;
use crate::error::{Result, ShopError};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns the user's cart, creating it on first access. The unique user_id
/// key plus a conflict-tolerant insert make concurrent calls collapse to the
/// surviving row.
pub async fn ensure_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<Cart> {
    if let Some(cart) = find_cart(&mut *conn, user_id).await? {
        return Ok(cart);
    }
    let inserted = sqlx::query_as::<_, Cart>(
        "INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(cart) => Ok(cart),
        // lost the race: the other writer's row is the cart
        None => find_cart(conn, user_id)
            .await?
            .ok_or(ShopError::NotFound("cart")),
    }
}

pub async fn find_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(cart)
}

pub async fn items(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<CartItem>> {
    let items =
        sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id")
            .bind(cart_id)
            .fetch_all(conn)
            .await?;
    Ok(items)
}

/// Adds a product to the user's cart. An existing line for the product is
/// incremented instead of duplicated. The stock check covers only the
/// quantity being added, not the resulting line total; checkout re-validates
/// the full line.
pub async fn add_item(
    conn: &mut PgConnection,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartItem> {
    let cart = ensure_cart(&mut *conn, user_id).await?;
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ShopError::ProductUnavailable(product_id))?;
    inventory::check_availability(&product, quantity)?;
    let item = sqlx::query_as::<_, CartItem>(
        "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (cart_id, product_id) \
         DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now() \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(cart.id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

/// Sets the quantity of a line in the user's cart. The stock check here is
/// absolute, unlike the add path.
pub async fn update_item(
    conn: &mut PgConnection,
    user_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> Result<CartItem> {
    let cart = find_cart(&mut *conn, user_id)
        .await?
        .ok_or(ShopError::NotFound("cart"))?;
    let item =
        sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart.id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(ShopError::NotFound("cart item"))?;
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(item.product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ShopError::ProductUnavailable(item.product_id))?;
    if product.stock < quantity {
        return Err(ShopError::InsufficientStock {
            name: product.name,
            available: product.stock,
            requested: quantity,
        });
    }
    let item = sqlx::query_as::<_, CartItem>(
        "UPDATE cart_items SET quantity = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(item.id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn remove_item(conn: &mut PgConnection, user_id: Uuid, item_id: Uuid) -> Result<()> {
    let cart = find_cart(&mut *conn, user_id)
        .await?
        .ok_or(ShopError::NotFound("cart"))?;
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart.id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ShopError::NotFound("cart item"));
    }
    Ok(())
}

/// Empties the user's cart. A cart with no lines is a no-op.
pub async fn clear(conn: &mut PgConnection, user_id: Uuid) -> Result<()> {
    let cart = find_cart(&mut *conn, user_id)
        .await?
        .ok_or(ShopError::NotFound("cart"))?;
    clear_items(conn, cart.id).await
}

/// Deletes every line of a cart by id. Checkout uses this directly.
pub(crate) async fn clear_items(conn: &mut PgConnection, cart_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}
