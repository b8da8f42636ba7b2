//! Category catalog endpoints. Reads are public, writes are admin-only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::category::Category;
use crate::error::{Result, ShopError};
use crate::routes::Page;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_by_id).put(update).delete(delete))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

async fn list(State(state): State<AppState>, Query(page): Query<Page>) -> Result<Json<Vec<Category>>> {
    let (skip, limit) = page.bounds();
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories ORDER BY name OFFSET $1 LIMIT $2",
    )
    .bind(skip)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(categories))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ShopError::NotFound("category"))?;
    Ok(Json(category))
}

async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    req.validate()?;
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, name, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(&req.description)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    req.validate()?;
    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = $2, description = $3, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ShopError::NotFound("category"))?;
    Ok(Json(category))
}

/// A category still attached to products cannot be deleted.
async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await?;
    let (references,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM product_categories WHERE category_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if references > 0 {
        return Err(ShopError::Validation(
            "category is still referenced by products".into(),
        ));
    }
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ShopError::NotFound("category"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
