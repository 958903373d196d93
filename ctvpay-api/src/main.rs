//! # CTV Pay API Server
//!
//! Serves the collaborator salary portal: admin directory and salary
//! management, and each collaborator's live salary feed and dashboard.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... JWT_SECRET=... cargo run -p ctvpay-api
//! ```

use anyhow::Context;
use ctvpay_api::{
    app::{build_router, AppState},
    config::Config,
};
use ctvpay_shared::{
    changes::{local::LocalChangeStream, ChangeNotifier},
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    redis::{RedisChangeStream, RedisClient, RedisConfig},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "ctvpay_api=debug,ctvpay_shared=debug,tower_http=debug";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn change_notifier(config: &Config) -> anyhow::Result<Arc<dyn ChangeNotifier>> {
    let Some(url) = config.redis_url.as_deref() else {
        tracing::info!("REDIS_URL not set, using in-process change notices");
        return Ok(Arc::new(LocalChangeStream::new()));
    };

    let client = RedisClient::new(RedisConfig::new(url))
        .await
        .context("failed to connect to Redis")?;
    tracing::info!(url = %client.url(), "Using Redis change stream");

    Ok(Arc::new(RedisChangeStream::new(client)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    tracing::info!("CTV Pay API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("failed to connect to PostgreSQL")?;

    if config.database.run_migrations {
        run_migrations(&pool).await.context("failed to run migrations")?;
    }

    let changes = change_notifier(&config).await?;
    let bind_address = config.bind_address();

    let state = AppState::new(pool.clone(), config, changes);
    let feeds = state.feeds.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            feeds.cancel_all();
        })
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
