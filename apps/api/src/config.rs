use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const MAX_MARKET_DATA_AGE_DAYS: i64 = 36_500;

/// Application configuration loaded from environment variables.
///
/// Every collaborator is optional: with nothing configured the service still
/// starts, serving recommendations from default market data.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Postgres holding `market_rates` and `rate_outcomes`.
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    /// Upstream market-data service. Takes precedence over Postgres.
    pub market_data_url: Option<String>,
    pub market_data_seed_path: Option<PathBuf>,
    pub market_data_timeout: Duration,
    pub market_data_max_age_days: i64,
    pub market_cache_ttl_seconds: u64,
    /// Logistic weights for the learned win model. Unset → heuristic model.
    pub win_model_path: Option<PathBuf>,
    /// Shared secret required on `/ai/*` routes. Unset → development bypass.
    pub service_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            market_data_url: optional_env("MARKET_DATA_URL"),
            market_data_seed_path: optional_env("MARKET_DATA_SEED_PATH").map(PathBuf::from),
            market_data_timeout: Duration::from_millis(parse_env("MARKET_DATA_TIMEOUT_MS", 2000)?),
            market_data_max_age_days: max_age_days(parse_env("MARKET_DATA_MAX_AGE_DAYS", 30)?)?,
            market_cache_ttl_seconds: parse_env("MARKET_CACHE_TTL_SECONDS", 1800)?,
            win_model_path: optional_env("WIN_MODEL_PATH").map(PathBuf::from),
            service_token: optional_env("ML_SERVICE_TOKEN"),
        })
    }
}

/// Staleness threshold for market snapshots, between one day and a century.
fn max_age_days(days: i64) -> Result<i64> {
    anyhow::ensure!(
        (1..=MAX_MARKET_DATA_AGE_DAYS).contains(&days),
        "MARKET_DATA_MAX_AGE_DAYS must be between 1 and {MAX_MARKET_DATA_AGE_DAYS}, got {days}"
    );
    Ok(days)
}

/// Empty values count as unset so `FOO=` in a .env file disables a backend.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
