//! Market-rate data: the external source of per-skill percentile distributions.
//!
//! The optimizer only sees `Arc<dyn MarketDataProvider>`. Backends are chosen in
//! `main` from configuration: HTTP upstream, Postgres, or an in-memory table,
//! optionally wrapped in a Redis cache.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::market::{ExperienceLevel, MarketRateSnapshot};

pub mod cache;
pub mod http;
pub mod memory;
pub mod postgres;

pub use cache::CachedMarketDataProvider;
pub use http::HttpMarketDataProvider;
pub use memory::InMemoryMarketDataProvider;
pub use postgres::PgMarketDataProvider;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lookup timed out after {0}ms")]
    Timeout(u128),
}

/// Source of market rate percentiles.
///
/// `Ok(None)` means the skill is unknown to the source; errors are transport or
/// storage failures. Implementations must be side-effect free from the caller's view.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_rate_data(
        &self,
        skill: &str,
        experience_level: ExperienceLevel,
        location: Option<&str>,
    ) -> Result<Option<MarketRateSnapshot>, MarketDataError>;

    /// Short label for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

/// Lookup key normalisation shared by every backend.
pub fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}
