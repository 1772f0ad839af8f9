use std::sync::Arc;
use std::time::Duration;

use huddle::auth::TokenKey;
use huddle::rate_limit::RateLimiter;
use huddle::realtime::{transport::InMemoryPubSub, AppCreds, Broadcaster};
use huddle::{db, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,info".into()),
        )
        .init();

    let db_pool = db::connect(&dotenv::var("DATABASE_URL")?).await?;

    let state = AppState {
        db_pool,
        token_key: TokenKey(dotenv::var("HUDDLE_TOKEN_SECRET")?),
        app_creds: AppCreds {
            key: dotenv::var("HUDDLE_APP_KEY")?,
            secret: dotenv::var("HUDDLE_APP_SECRET")?,
        },
        // Single-node transport; a provider-backed PubSub slots in here.
        broadcaster: Broadcaster::new(Arc::new(InMemoryPubSub::new())),
        rate_limiter: RateLimiter::new(30, Duration::from_secs(60)),
    };

    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "huddle listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
