pub mod auth;
pub mod channel;
pub mod chats;
pub mod client;
pub mod db;
pub mod error;
pub mod rate_limit;
pub mod realtime;

pub use error::{AppError, AppResult};

use axum::extract::FromRef;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;

use auth::TokenKey;
use rate_limit::RateLimiter;
use realtime::{AppCreds, Broadcaster};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub token_key: TokenKey,
    pub app_creds: AppCreds,
    pub broadcaster: Broadcaster,
    pub rate_limiter: RateLimiter,
}

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .nest("/chats", chats::router())
        .nest("/realtime", realtime::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
