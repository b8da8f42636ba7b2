//! Vestra: a self-hosted fashion store backend.
//!
//! The interesting machinery lives in [`domain`]: the cart aggregate, the
//! order state machine, the stock ledger and the checkout workflow that ties
//! them together inside one transaction. Everything else is the usual shell
//! around it: bearer-token auth, validated request payloads, and a JSON error
//! surface.

use axum::extract::FromRef;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod routes;

pub use config::Config;
pub use error::{Result, ShopError};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.db.clone()
    }
}

/// Assembles the full application router.
pub fn app(state: AppState) -> axum::Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
