//! Crate-wide error type and its HTTP mapping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::domain::order::OrderStatus;

/// Every failure the workflows can produce. Each kind maps to exactly one
/// HTTP status in [`IntoResponse`]; workflow code deals only in kinds.
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("invalid or expired credentials")]
    Unauthenticated,

    #[error("insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i32,
        requested: i32,
    },

    #[error("product {0} is not available")]
    ProductUnavailable(Uuid),

    #[error("cart is empty")]
    EmptyCart,

    #[error("order in status {current} cannot be cancelled")]
    InvalidState { current: OrderStatus },

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

pub type Result<T> = std::result::Result<T, ShopError>;

impl ShopError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
            ShopError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ShopError::InsufficientStock { .. }
            | ShopError::ProductUnavailable(_)
            | ShopError::EmptyCart
            | ShopError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            ShopError::DuplicateKey(_) => StatusCode::CONFLICT,
            ShopError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ShopError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Unique violations surface as [`ShopError::DuplicateKey`] so insert races
/// lost to a pre-check still report the same kind the pre-check would have.
impl From<sqlx::Error> for ShopError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                let constraint = db.constraint().unwrap_or("unique key");
                return ShopError::DuplicateKey(format!("duplicate value for {constraint}"));
            }
        }
        ShopError::Database(err)
    }
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(err: validator::ValidationErrors) -> Self {
        ShopError::Validation(err.to_string())
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ShopError::Database(err) => {
                tracing::error!(error = %err, "database failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({ "error": message }));
        match self {
            ShopError::Unauthenticated => {
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
