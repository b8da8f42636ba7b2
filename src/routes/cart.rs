//! Cart endpoints. Every route is scoped to the authenticated user's own
//! cart; there is no way to address another user's cart by id.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::cart::{self, Cart, CartItem};
use crate::error::Result;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear))
        .route("/items", post(add_item))
        .route("/items/:id", put(update_item).delete(remove_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

/// Creates the cart on first access.
async fn get_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CartResponse>> {
    let mut tx = state.db.begin().await?;
    let cart = cart::ensure_cart(&mut tx, user.id).await?;
    let items = cart::items(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(Json(CartResponse { cart, items }))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
async fn add_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    req.validate()?;
    let mut tx = state.db.begin().await?;
    let item = cart::add_item(&mut tx, user.id, req.product_id, req.quantity).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartItem>> {
    req.validate()?;
    let mut tx = state.db.begin().await?;
    let item = cart::update_item(&mut tx, user.id, item_id, req.quantity).await?;
    tx.commit().await?;
    Ok(Json(item))
}

async fn remove_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await?;
    cart::remove_item(&mut tx, user.id, item_id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<StatusCode> {
    let mut tx = state.db.begin().await?;
    cart::clear(&mut tx, user.id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
