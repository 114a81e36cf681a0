use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use devcamper_api::config::{self, AppConfig};
use devcamper_api::database::{DataAccessor, MemoryStore, PgStore};
use devcamper_api::{app, models, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load env files so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    AppConfig::load_env_files();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = config::config();
    tracing::info!("Starting DevCamper API in {:?} mode", config.environment);

    let db: Arc<dyn DataAccessor> = match config.database.url {
        Some(_) => {
            let store = PgStore::connect(&config.database, &models::ALL).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory and lost on exit");
            Arc::new(MemoryStore::with_collections(&models::ALL))
        }
    };

    let app = app(AppState::new(db, config.clone()));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("DevCamper API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}
