//! Shared test harness: one PostgreSQL container for the whole test binary,
//! a fresh pool plus truncated tables per test, and row fixtures.
#![allow(dead_code)] // each test binary uses its own subset

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use vestra::auth::hash_password;
use vestra::domain::product::{Gender, Product};
use vestra::domain::user::User;
use vestra::{AppState, Config};

struct ContainerInfo {
    #[allow(dead_code)] // container must stay alive for the whole binary
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{host}:{port}/postgres");

            let pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::migrate!("./migrations").run(&pool).await.unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool with every table emptied. Tests run `#[serial]`, so truncation
/// here is enough isolation.
pub async fn pool() -> PgPool {
    let info = container_info().await;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();
    sqlx::query(
        "TRUNCATE users, api_tokens, addresses, categories, products, \
         product_categories, carts, cart_items, orders, order_items CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool
}

pub fn state(pool: PgPool) -> AppState {
    AppState {
        db: pool,
        config: Config {
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 0,
            db_max_connections: 5,
            token_ttl_hours: 24,
        },
    }
}

pub async fn create_user(pool: &PgPool, email: &str, is_admin: bool) -> User {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, password_hash, is_admin) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(email)
    .bind(hash_password("correct horse battery"))
    .bind(is_admin)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_product(pool: &PgPool, name: &str, price: Decimal, stock: i32) -> Product {
    sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, price, stock, gender) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(name)
    .bind(price)
    .bind(stock)
    .bind(Gender::Unisex)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn product_stock(pool: &PgPool, product_id: Uuid) -> i32 {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap();
    stock
}

pub async fn token_for(pool: &PgPool, user: &User) -> String {
    let mut conn = pool.acquire().await.unwrap();
    vestra::auth::issue_token(&mut conn, user.id, 24).await.unwrap()
}
