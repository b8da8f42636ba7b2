//! Order aggregate: orders, their immutable item snapshots, and the status
//! machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::fmt;
use uuid::Uuid;

use crate::auth;
use crate::domain::inventory;
use crate::domain::user::User;
use crate::error::{Result, ShopError};

/// Lifecycle of an order. Stored as lowercase text.
///
/// ```text
/// Pending ──► Paid ──► Shipped ──► Delivered
///    │
///    └──► Cancelled
/// ```
///
/// `cancel` is the only transition the service guards; the admin update
/// overwrites the column without consulting the machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Cancellation is only reachable from Pending.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot line. `price` is copied from the product at order time and never
/// updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order about to be written.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Creates an order from explicit lines, bypassing the cart. Every product is
/// validated and its stock debited before the first order row is written, all
/// inside the caller's transaction, so a bad line leaves nothing behind.
/// Per-item prices and the total are recorded as supplied.
#[tracing::instrument(skip(conn, items))]
pub async fn place_order(
    conn: &mut PgConnection,
    user_id: Uuid,
    items: &[NewOrderItem],
    total_amount: Decimal,
    shipping_address: &str,
    status: OrderStatus,
) -> Result<(Order, Vec<OrderItem>)> {
    for item in items {
        inventory::reserve(&mut *conn, item.product_id, item.quantity).await?;
    }
    let order = insert_order(&mut *conn, user_id, total_amount, status, shipping_address).await?;
    let lines = insert_items(&mut *conn, order.id, items).await?;
    Ok((order, lines))
}

/// Cancels an order and restores its stock. Only the owner or an admin may
/// cancel, and only while the order is still pending. The order row is
/// locked first so concurrent cancels cannot release stock twice.
#[tracing::instrument(skip(conn, actor))]
pub async fn cancel(conn: &mut PgConnection, order_id: Uuid, actor: &User) -> Result<()> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ShopError::NotFound("order"))?;
    auth::ensure_owner_or_admin(actor, order.user_id)?;
    if !order.status.can_cancel() {
        return Err(ShopError::InvalidState {
            current: order.status,
        });
    }
    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(order.id)
        .bind(OrderStatus::Cancelled)
        .execute(&mut *conn)
        .await?;
    for item in items(&mut *conn, order.id).await? {
        inventory::release(&mut *conn, item.product_id, item.quantity).await?;
    }
    tracing::info!(%order_id, "order cancelled, stock restored");
    Ok(())
}

/// Permissive admin update: overwrites the supplied fields as-is.
pub async fn admin_update(
    conn: &mut PgConnection,
    order_id: Uuid,
    status: Option<OrderStatus>,
    shipping_address: Option<&str>,
) -> Result<Order> {
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = COALESCE($2, status), \
         shipping_address = COALESCE($3, shipping_address), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(status)
    .bind(shipping_address)
    .fetch_optional(conn)
    .await?
    .ok_or(ShopError::NotFound("order"))?;
    Ok(order)
}

/// Admins see every order, everyone else their own.
pub async fn list(conn: &mut PgConnection, actor: &User, skip: i64, limit: i64) -> Result<Vec<Order>> {
    let orders = if actor.is_admin {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(conn)
        .await?
    } else {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC OFFSET $2 LIMIT $3",
        )
        .bind(actor.id)
        .bind(skip)
        .bind(limit)
        .fetch_all(conn)
        .await?
    };
    Ok(orders)
}

pub async fn get(
    conn: &mut PgConnection,
    order_id: Uuid,
    actor: &User,
) -> Result<(Order, Vec<OrderItem>)> {
    let order = find(&mut *conn, order_id)
        .await?
        .ok_or(ShopError::NotFound("order"))?;
    auth::ensure_owner_or_admin(actor, order.user_id)?;
    let lines = items(&mut *conn, order.id).await?;
    Ok((order, lines))
}

pub async fn find(conn: &mut PgConnection, order_id: Uuid) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn items(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let lines = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

pub(crate) async fn insert_order(
    conn: &mut PgConnection,
    user_id: Uuid,
    total_amount: Decimal,
    status: OrderStatus,
    shipping_address: &str,
) -> Result<Order> {
    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, user_id, total_amount, status, shipping_address) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(total_amount)
    .bind(status)
    .bind(shipping_address)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub(crate) async fn insert_items(
    conn: &mut PgConnection,
    order_id: Uuid,
    items: &[NewOrderItem],
) -> Result<Vec<OrderItem>> {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let line = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .fetch_one(&mut *conn)
        .await?;
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn only_pending_orders_can_cancel() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(!OrderStatus::Paid.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_serializes_to_its_wire_form() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: OrderStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn unknown_status_text_is_rejected() {
        assert!(serde_json::from_str::<OrderStatus>("\"refunded\"").is_err());
    }
}
