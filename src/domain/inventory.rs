//! Stock ledger: guarded debits and credits on product rows.
//!
//! All mutations run inside the caller's transaction and take row locks
//! first, so concurrent workflows serialize on the products they touch. The
//! `CHECK (stock >= 0)` column constraint backstops the guards here.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::product::Product;
use crate::error::{Result, ShopError};

/// Checks that a product can satisfy a requested quantity.
pub fn check_availability(product: &Product, requested: i32) -> Result<()> {
    if !product.is_active {
        return Err(ShopError::ProductUnavailable(product.id));
    }
    if product.stock < requested {
        return Err(ShopError::InsufficientStock {
            name: product.name.clone(),
            available: product.stock,
            requested,
        });
    }
    Ok(())
}

/// Locks the given product rows for the rest of the transaction. Rows are
/// locked in id order so overlapping workflows cannot deadlock.
pub async fn lock_products(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;
    Ok(products)
}

/// Locks one product row, validates availability and debits stock. Returns
/// the locked product so the caller can snapshot its current price.
pub async fn reserve(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ShopError::ProductUnavailable(product_id))?;
    check_availability(&product, quantity)?;
    debit(conn, product_id, quantity).await?;
    Ok(product)
}

/// Debits stock. Callers must hold the row lock and have checked
/// availability first.
pub(crate) async fn debit(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> Result<()> {
    sqlx::query("UPDATE products SET stock = stock - $2, updated_at = now() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}

/// Credits stock back. Succeeds silently if the product row is gone.
pub async fn release(conn: &mut PgConnection, product_id: Uuid, quantity: i32) -> Result<()> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}
