mod comparison;
mod config;
mod db;
mod errors;
mod models;
mod projects;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::comparison::engine::ComparisonEngine;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryRatingStore, PgRatingStore, RatingStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ranker API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the rating store
    let store: Arc<dyn RatingStore> = match &config.database_url {
        Some(url) => Arc::new(PgRatingStore::new(create_pool(url).await?)),
        None => {
            info!("DATABASE_URL not set; using in-memory rating store");
            Arc::new(MemoryRatingStore::new())
        }
    };

    let settings = config.engine_settings();
    info!(
        "Engine: K={} baseline={} k/applicant={} reservation TTL={}s",
        settings.k_factor,
        settings.baseline_rating,
        settings.comparisons_per_applicant,
        settings.reservation_ttl.as_secs()
    );
    let engine = Arc::new(ComparisonEngine::new(store, settings));

    let cors = build_cors(&config)?;

    // Build app state
    let state = AppState {
        engine,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS for the review frontend: one allowed origin, credentials on.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    let origin: HeaderValue = config
        .frontend_url
        .parse()
        .with_context(|| format!("FRONTEND_URL '{}' is not a valid origin", config.frontend_url))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300)))
}
