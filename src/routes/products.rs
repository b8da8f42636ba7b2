//! Product catalog endpoints. Reads are public, writes are admin-only.
//! Products referenced by orders are never hard-deleted; delete flips the
//! active flag.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::product::{Gender, Product, Sku};
use crate::error::{Result, ShopError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_by_id).put(update).delete(delete))
}

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub gender: Option<Gender>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "crate::routes::positive_price")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: i32,
    pub image_url: Option<String>,
    pub gender: Gender,
    pub sku: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "crate::routes::positive_price")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub gender: Option<Gender>,
    pub is_active: Option<bool>,
    pub category_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub category_ids: Vec<Uuid>,
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    let (skip, limit) = super::page_bounds(filter.skip, filter.limit);
    let products = sqlx::query_as::<_, Product>(
        "SELECT p.* FROM products p \
         WHERE p.is_active \
           AND ($3::text IS NULL OR p.gender = $3) \
           AND ($4::uuid IS NULL OR EXISTS (SELECT 1 FROM product_categories pc \
                WHERE pc.product_id = p.id AND pc.category_id = $4)) \
           AND ($5::numeric IS NULL OR p.price >= $5) \
           AND ($6::numeric IS NULL OR p.price <= $6) \
           AND ($7::text IS NULL OR p.name ILIKE '%' || $7 || '%') \
         ORDER BY p.created_at DESC OFFSET $1 LIMIT $2",
    )
    .bind(skip)
    .bind(limit)
    .bind(filter.gender.map(|g| g.as_str()))
    .bind(filter.category_id)
    .bind(filter.min_price)
    .bind(filter.max_price)
    .bind(filter.search)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(products))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>> {
    let mut conn = state.db.acquire().await?;
    // soft-deleted products are invisible on the public surface
    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(ShopError::NotFound("product"))?;
    let category_ids = category_ids(&mut conn, id).await?;
    Ok(Json(ProductResponse {
        product,
        category_ids,
    }))
}

#[tracing::instrument(skip(state, req), fields(name = %req.name))]
async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    req.validate()?;
    let sku = req.sku.map(Sku::new).transpose()?;

    let mut tx = state.db.begin().await?;
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, description, price, stock, image_url, gender, sku) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.stock)
    .bind(&req.image_url)
    .bind(req.gender)
    .bind(sku)
    .fetch_one(&mut *tx)
    .await?;
    link_categories(&mut tx, product.id, &req.category_ids).await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, "product created");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            product,
            category_ids: req.category_ids,
        }),
    ))
}

async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>> {
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = COALESCE($2, name), \
         description = COALESCE($3, description), \
         price = COALESCE($4, price), stock = COALESCE($5, stock), \
         image_url = COALESCE($6, image_url), gender = COALESCE($7, gender), \
         is_active = COALESCE($8, is_active), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.stock)
    .bind(&req.image_url)
    .bind(req.gender)
    .bind(req.is_active)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ShopError::NotFound("product"))?;

    if let Some(ids) = &req.category_ids {
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, id, ids).await?;
    }
    let category_ids = category_ids(&mut tx, id).await?;
    tx.commit().await?;

    Ok(Json(ProductResponse {
        product,
        category_ids,
    }))
}

/// Soft delete: historical orders keep their references.
async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let result =
        sqlx::query("UPDATE products SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&state.db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ShopError::NotFound("product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn link_categories(
    conn: &mut PgConnection,
    product_id: Uuid,
    category_ids: &[Uuid],
) -> Result<()> {
    for category_id in category_ids {
        let linked = sqlx::query(
            "INSERT INTO product_categories (product_id, category_id) \
             SELECT $1, id FROM categories WHERE id = $2",
        )
        .bind(product_id)
        .bind(category_id)
        .execute(&mut *conn)
        .await?;
        if linked.rows_affected() == 0 {
            return Err(ShopError::NotFound("category"));
        }
    }
    Ok(())
}

async fn category_ids(conn: &mut PgConnection, product_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT category_id FROM product_categories WHERE product_id = $1 ORDER BY category_id",
    )
    .bind(product_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
