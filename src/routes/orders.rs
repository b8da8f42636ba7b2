//! Order endpoints: direct creation, cart checkout, listing, admin update
//! and cancellation. Each multi-step workflow runs in one transaction.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::domain::checkout;
use crate::domain::order::{self, NewOrderItem, Order, OrderItem, OrderStatus};
use crate::error::{Result, ShopError};
use crate::routes::Page;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/checkout", post(checkout))
        .route("/:id", get(get_by_id).put(admin_update).delete(cancel))
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "crate::routes::positive_price")]
    pub price: Decimal,
}

/// Direct creation takes the per-item prices and the total as supplied.
/// Checkout is the path that computes both server-side.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Place the order for another user. Admin-only.
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, message = "order needs at least one item"))]
    pub items: Vec<OrderItemRequest>,
    #[validate(custom = "crate::routes::positive_price")]
    pub total_amount: Decimal,
    #[validate(length(min = 1, message = "shipping address must not be empty"))]
    pub shipping_address: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "shipping address must not be empty"))]
    pub shipping_address: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateRequest {
    pub status: Option<OrderStatus>,
    #[validate(length(min = 1, message = "shipping address must not be empty"))]
    pub shipping_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Order>>> {
    let (skip, limit) = page.bounds();
    let mut conn = state.db.acquire().await?;
    let orders = order::list(&mut conn, &actor, skip, limit).await?;
    Ok(Json(orders))
}

async fn get_by_id(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>> {
    let mut conn = state.db.acquire().await?;
    let (order, items) = order::get(&mut conn, id, &actor).await?;
    Ok(Json(OrderResponse { order, items }))
}

#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    req.validate()?;
    for item in &req.items {
        item.validate()?;
    }
    let owner_id = req.user_id.unwrap_or(user.id);
    crate::auth::ensure_owner_or_admin(&user, owner_id)?;
    let items: Vec<NewOrderItem> = req
        .items
        .iter()
        .map(|i| NewOrderItem {
            product_id: i.product_id,
            quantity: i.quantity,
            price: i.price,
        })
        .collect();

    let mut tx = state.db.begin().await?;
    let (order, items) = order::place_order(
        &mut tx,
        owner_id,
        &items,
        req.total_amount,
        &req.shipping_address,
        OrderStatus::Pending,
    )
    .await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(OrderResponse { order, items })))
}

#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
async fn checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    req.validate()?;
    let mut tx = state.db.begin().await?;
    let (order, items) = checkout::checkout(&mut tx, user.id, &req.shipping_address).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(OrderResponse { order, items })))
}

async fn admin_update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateRequest>,
) -> Result<Json<Order>> {
    req.validate()?;
    let mut conn = state.db.acquire().await?;
    let order = order::admin_update(&mut conn, id, req.status, req.shipping_address.as_deref()).await?;
    Ok(Json(order))
}

async fn cancel(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let mut tx = state.db.begin().await?;
    order::cancel(&mut tx, id, &actor).await?;
    let order = order::find(&mut tx, id)
        .await?
        .ok_or(ShopError::NotFound("order"))?;
    tx.commit().await?;
    Ok(Json(order))
}
