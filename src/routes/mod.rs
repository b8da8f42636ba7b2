//! HTTP surface: `/api/v1` routers and the handlers behind them.

use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::ValidationError;

use crate::AppState;

pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/users", users::router())
        .nest("/api/v1/categories", categories::router())
        .nest("/api/v1/products", products::router())
        .nest("/api/v1/cart", cart::router())
        .nest("/api/v1/orders", orders::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "vestra" }))
}

/// skip/limit paging accepted by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct Page {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Page {
    pub fn bounds(&self) -> (i64, i64) {
        page_bounds(self.skip, self.limit)
    }
}

pub(crate) fn page_bounds(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (skip.unwrap_or(0).max(0), limit.unwrap_or(100).clamp(1, 500))
}

pub(crate) fn positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("price must be greater than zero"))
    }
}
