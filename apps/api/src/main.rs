mod auth;
mod config;
mod db;
mod errors;
mod market_data;
mod models;
mod outcomes;
mod rate;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::market_data::{
    CachedMarketDataProvider, HttpMarketDataProvider, InMemoryMarketDataProvider,
    MarketDataProvider, PgMarketDataProvider,
};
use crate::outcomes::{OutcomeSink, PgOutcomeSink, TracingOutcomeSink};
use crate::rate::optimizer::RateOptimizerService;
use crate::rate::win_model::{HeuristicWinModel, LogisticWinModel, WinProbabilityModel};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ratewise v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL is optional: market rates and outcome records
    let db = match &config.database_url {
        Some(url) => Some(create_pool(url).await?),
        None => {
            info!("DATABASE_URL not set; outcomes will only be logged");
            None
        }
    };

    let model = build_win_model(&config)?;
    info!("Win model initialized (backend: {})", model.backend());

    let market = build_market_data(&config, db.as_ref())?;
    info!(
        "Market data initialized (backend: {}, timeout: {}ms)",
        market.backend(),
        config.market_data_timeout.as_millis()
    );

    let outcomes: Arc<dyn OutcomeSink> = match &db {
        Some(pool) => Arc::new(PgOutcomeSink::new(pool.clone())),
        None => Arc::new(TracingOutcomeSink),
    };

    if config.service_token.is_none() {
        warn!("ML_SERVICE_TOKEN not set; /ai/* routes are unauthenticated");
    }

    let optimizer = Arc::new(RateOptimizerService::new(
        model,
        market,
        config.market_data_timeout,
        config.market_data_max_age_days,
    ));

    // Build app state
    let state = AppState {
        config: config.clone(),
        optimizer,
        outcomes,
        started_at: Instant::now(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the proposal frontend has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Logistic weights when `WIN_MODEL_PATH` is set, otherwise the heuristic.
fn build_win_model(config: &Config) -> Result<Arc<dyn WinProbabilityModel>> {
    let Some(path) = &config.win_model_path else {
        return Ok(Arc::new(HeuristicWinModel));
    };
    let model = LogisticWinModel::from_file(path)
        .with_context(|| format!("loading win model weights from {}", path.display()))?;
    info!("Loaded logistic win model version '{}'", model.version());
    Ok(Arc::new(model))
}

/// HTTP upstream > Postgres > in-memory, optionally behind the Redis cache.
fn build_market_data(config: &Config, db: Option<&PgPool>) -> Result<Arc<dyn MarketDataProvider>> {
    let source: Arc<dyn MarketDataProvider> = if let Some(url) = &config.market_data_url {
        Arc::new(HttpMarketDataProvider::new(url).context("building market data HTTP client")?)
    } else if let Some(pool) = db {
        Arc::new(PgMarketDataProvider::new(pool.clone()))
    } else if let Some(path) = &config.market_data_seed_path {
        let provider = InMemoryMarketDataProvider::from_seed_file(path)
            .with_context(|| format!("loading market data seed {}", path.display()))?;
        if provider.is_empty() {
            warn!("Market data seed {} has no snapshots", path.display());
        } else {
            info!("Serving {} market rate snapshots from memory", provider.len());
        }
        Arc::new(provider)
    } else {
        warn!("No market data source configured; every request will use default rates");
        Arc::new(InMemoryMarketDataProvider::new())
    };

    let Some(redis_url) = &config.redis_url else {
        return Ok(source);
    };
    let redis = redis::Client::open(redis_url.as_str()).context("opening Redis client")?;
    info!(
        "Redis market-rate cache enabled (ttl: {}s)",
        config.market_cache_ttl_seconds
    );
    Ok(Arc::new(CachedMarketDataProvider::new(
        source,
        redis,
        config.market_cache_ttl_seconds,
    )))
}
