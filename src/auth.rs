//! Authentication and authorization: salted password digests, opaque bearer
//! tokens held server-side, and the request guards built on them.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::user::User;
use crate::error::{Result, ShopError};

/// Hashes a password with a fresh random salt.
/// Stored form: `base64(salt) "$" base64(sha256(salt || password))`.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let digest = digest_with_salt(&salt, password);
    format!("{}${}", STANDARD.encode(salt), STANDARD.encode(digest))
}

/// Verifies a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = STANDARD.decode(salt) else {
        return false;
    };
    let Ok(digest) = STANDARD.decode(digest) else {
        return false;
    };
    digest_with_salt(&salt, password).as_slice() == digest.as_slice()
}

fn digest_with_salt(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Issues a fresh opaque token for the user.
pub async fn issue_token(conn: &mut PgConnection, user_id: Uuid, ttl_hours: i64) -> Result<String> {
    let token = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    sqlx::query("INSERT INTO api_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&token)
        .bind(user_id)
        .bind(expires_at)
        .execute(conn)
        .await?;
    Ok(token)
}

/// Resolves a bearer token to its user. Expired tokens and inactive users
/// both fail as `Unauthenticated`.
pub async fn authenticate(pool: &PgPool, token: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.* FROM users u JOIN api_tokens t ON t.user_id = u.id \
         WHERE t.token = $1 AND t.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?
    .ok_or(ShopError::Unauthenticated)?;
    if !user.is_active {
        return Err(ShopError::Unauthenticated);
    }
    Ok(user)
}

/// Deletes expired tokens. Called opportunistically on login.
pub async fn sweep_expired_tokens(conn: &mut PgConnection) -> Result<()> {
    sqlx::query("DELETE FROM api_tokens WHERE expires_at <= now()")
        .execute(conn)
        .await?;
    Ok(())
}

pub fn require_admin(actor: &User) -> Result<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(ShopError::Forbidden("administrator access required"))
    }
}

/// Owner-or-admin rule applied to every ownership-scoped operation.
pub fn ensure_owner_or_admin(actor: &User, owner_id: Uuid) -> Result<()> {
    if actor.is_admin || actor.id == owner_id {
        Ok(())
    } else {
        Err(ShopError::Forbidden("not the owner of this resource"))
    }
}

/// The authenticated principal.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    PgPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let token = bearer_token(parts).ok_or(ShopError::Unauthenticated)?;
        let pool = PgPool::from_ref(state);
        let user = authenticate(&pool, &token).await?;
        Ok(CurrentUser(user))
    }
}

/// An authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    PgPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(&user)?;
        Ok(AdminUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}
