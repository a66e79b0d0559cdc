use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;

use super::{normalize_skill, MarketDataError, MarketDataProvider};
use crate::models::market::{ExperienceLevel, MarketRateSnapshot};

/// Row shape of the `market_rates` table (see `migrations/0001_market_rates.sql`).
#[derive(Debug, Clone, FromRow)]
struct MarketRateRow {
    skill: String,
    experience_level: String,
    percentile_25: f64,
    percentile_50: f64,
    percentile_75: f64,
    percentile_90: f64,
    sample_size: i32,
    trend: Option<String>,
    last_updated: DateTime<Utc>,
}

impl MarketRateRow {
    fn into_snapshot(self, requested_level: ExperienceLevel) -> MarketRateSnapshot {
        let experience_level = self.experience_level.parse().unwrap_or_else(|e| {
            warn!("market_rates row for {} has {e}", self.skill);
            requested_level
        });
        let trend = self
            .trend
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();

        MarketRateSnapshot {
            skill: self.skill,
            experience_level,
            percentile_25: self.percentile_25,
            percentile_50: self.percentile_50,
            percentile_75: self.percentile_75,
            percentile_90: self.percentile_90,
            sample_size: self.sample_size.max(0) as u32,
            trend,
            last_updated: self.last_updated,
        }
    }
}

/// Reads percentiles from Postgres. A location-specific row wins over the
/// location-agnostic one; among equals the freshest row wins.
pub struct PgMarketDataProvider {
    pool: PgPool,
}

impl PgMarketDataProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketDataProvider for PgMarketDataProvider {
    async fn get_rate_data(
        &self,
        skill: &str,
        experience_level: ExperienceLevel,
        location: Option<&str>,
    ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
        let row = sqlx::query_as::<_, MarketRateRow>(
            r#"
            SELECT skill, experience_level, percentile_25, percentile_50,
                   percentile_75, percentile_90, sample_size, trend, last_updated
            FROM market_rates
            WHERE lower(skill) = $1
              AND experience_level = $2
              AND (location = $3 OR location IS NULL)
            ORDER BY (location IS NULL), last_updated DESC
            LIMIT 1
            "#,
        )
        .bind(normalize_skill(skill))
        .bind(experience_level.as_str())
        .bind(location)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_snapshot(experience_level)))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
