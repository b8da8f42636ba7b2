//! Registration and login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, hash_password, verify_password};
use crate::domain::user::User;
use crate::error::{Result, ShopError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Public registration always creates a regular account; admin accounts are
/// provisioned out-of-band.
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    req.validate()?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, password_hash, first_name, last_name) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(req.email.to_lowercase())
    .bind(hash_password(&req.password))
    .bind(&req.first_name)
    .bind(&req.last_name)
    .fetch_one(&state.db)
    .await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchanges credentials for a bearer token. Wrong email, wrong password and
/// a deactivated account are indistinguishable to the caller.
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    req.validate()?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(req.email.to_lowercase())
        .fetch_optional(&state.db)
        .await?
        .ok_or(ShopError::Unauthenticated)?;
    if !user.is_active || !verify_password(&req.password, &user.password_hash) {
        return Err(ShopError::Unauthenticated);
    }

    let mut tx = state.db.begin().await?;
    auth::sweep_expired_tokens(&mut tx).await?;
    let token = auth::issue_token(&mut tx, user.id, state.config.token_ttl_hours).await?;
    tx.commit().await?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
    }))
}
