//! Account endpoints: self-service profile plus admin user management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, AdminUser, CurrentUser};
use crate::domain::user::User;
use crate::error::{Result, ShopError};
use crate::routes::Page;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/me", get(me).put(update_me))
        .route("/:id", get(get_by_id).put(admin_update).delete(admin_delete))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
}

/// Email stays unique across accounts; a collision surfaces as DuplicateKey
/// via the unique constraint.
async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<User>> {
    req.validate()?;
    let user = apply_update(
        &state,
        user.id,
        req.email.map(|e| e.to_lowercase()),
        req.first_name,
        req.last_name,
        req.password.as_deref().map(hash_password),
        None,
        None,
    )
    .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

/// The only path that can grant or revoke admin.
async fn admin_update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> Result<Json<User>> {
    req.validate()?;
    let user = apply_update(
        &state,
        id,
        req.email.map(|e| e.to_lowercase()),
        req.first_name,
        req.last_name,
        req.password.as_deref().map(hash_password),
        req.is_active,
        req.is_admin,
    )
    .await?;
    Ok(Json(user))
}

#[allow(clippy::too_many_arguments)]
async fn apply_update(
    state: &AppState,
    id: Uuid,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password_hash: Option<String>,
    is_active: Option<bool>,
    is_admin: Option<bool>,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET email = COALESCE($2, email), \
         first_name = COALESCE($3, first_name), \
         last_name = COALESCE($4, last_name), \
         password_hash = COALESCE($5, password_hash), \
         is_active = COALESCE($6, is_active), \
         is_admin = COALESCE($7, is_admin), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(password_hash)
    .bind(is_active)
    .bind(is_admin)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ShopError::NotFound("user"))
}

/// Deleting is blocked for the caller's own account and for accounts with
/// order history; deactivation is the tool for those.
async fn admin_delete(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if actor.id == id {
        return Err(ShopError::Validation(
            "cannot delete your own account".into(),
        ));
    }
    let mut tx = state.db.begin().await?;
    let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if orders > 0 {
        return Err(ShopError::Validation(
            "user has orders; deactivate the account instead".into(),
        ));
    }
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ShopError::NotFound("user"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<User>>> {
    let (skip, limit) = page.bounds();
    let users =
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(users))
}

async fn get_by_id(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ShopError::NotFound("user"))?;
    Ok(Json(user))
}
