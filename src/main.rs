//! TechShop - storefront order, promo, review and support service

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use techshop::api::{self, AppState};
use techshop::config::Config;
use techshop::services::EventPublisher;
use techshop::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let database_url = config.database_url.clone().context("DATABASE_URL must be set")?;
    let db = PgPoolOptions::new().max_connections(config.max_connections).connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, events will only be logged");
                None
            }
        },
        None => None,
    };

    let events = EventPublisher::new(nats);
    let event_bus = events.is_connected();
    let state = AppState::new(Arc::new(PgStore::new(db)), events, &config);
    let app = api::app(state);

    tracing::info!(
        port = config.port,
        event_bus,
        promo_usage = ?config.promo_usage,
        auto_reply = ?config.auto_reply,
        "TechShop listening on 0.0.0.0:{}",
        config.port
    );
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
