//! Cart-to-order conversion.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::cart::{self, CartItem};
use crate::domain::inventory;
use crate::domain::order::{self, NewOrderItem, Order, OrderItem, OrderStatus};
use crate::domain::product::Product;
use crate::error::{Result, ShopError};

/// The validated outcome of a checkout attempt: snapshot lines and the
/// server-computed total.
#[derive(Debug)]
pub struct CheckoutPlan {
    pub lines: Vec<NewOrderItem>,
    pub total: Decimal,
}

/// Validates every cart line against the current catalog state and computes
/// the total from current prices. Pure: callers fetch and lock the rows.
pub fn plan_checkout(
    items: &[CartItem],
    products: &HashMap<Uuid, Product>,
) -> Result<CheckoutPlan> {
    if items.is_empty() {
        return Err(ShopError::EmptyCart);
    }
    let mut lines = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;
    for item in items {
        let product = products
            .get(&item.product_id)
            .ok_or(ShopError::ProductUnavailable(item.product_id))?;
        inventory::check_availability(product, item.quantity)?;
        total += product.price * Decimal::from(item.quantity);
        lines.push(NewOrderItem {
            product_id: product.id,
            quantity: item.quantity,
            price: product.price,
        });
    }
    Ok(CheckoutPlan { lines, total })
}

/// Converts the user's cart into a pending order: lock, validate, snapshot,
/// debit, clear. Runs inside the caller's transaction, so a failure at any
/// line rolls the whole conversion back.
#[tracing::instrument(skip(conn))]
pub async fn checkout(
    conn: &mut PgConnection,
    user_id: Uuid,
    shipping_address: &str,
) -> Result<(Order, Vec<OrderItem>)> {
    let cart = cart::find_cart(&mut *conn, user_id)
        .await?
        .ok_or(ShopError::EmptyCart)?;
    let items = cart::items(&mut *conn, cart.id).await?;
    if items.is_empty() {
        return Err(ShopError::EmptyCart);
    }

    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, Product> = inventory::lock_products(&mut *conn, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let plan = plan_checkout(&items, &products)?;

    let order = order::insert_order(
        &mut *conn,
        user_id,
        plan.total,
        OrderStatus::Pending,
        shipping_address,
    )
    .await?;
    let lines = order::insert_items(&mut *conn, order.id, &plan.lines).await?;
    for line in &plan.lines {
        inventory::debit(&mut *conn, line.product_id, line.quantity).await?;
    }
    cart::clear_items(&mut *conn, cart.id).await?;

    tracing::info!(order_id = %order.id, total = %plan.total, "cart converted to order");
    Ok((order, lines))
}
