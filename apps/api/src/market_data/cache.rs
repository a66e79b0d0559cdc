use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{normalize_skill, MarketDataError, MarketDataProvider};
use crate::models::market::{ExperienceLevel, MarketRateSnapshot};

/// Redis read-through cache in front of another provider.
///
/// Only hits are cached. Redis failures are logged and the lookup goes to the
/// inner provider.
pub struct CachedMarketDataProvider {
    inner: Arc<dyn MarketDataProvider>,
    redis: redis::Client,
    ttl_seconds: u64,
}

impl CachedMarketDataProvider {
    pub fn new(inner: Arc<dyn MarketDataProvider>, redis: redis::Client, ttl_seconds: u64) -> Self {
        Self {
            inner,
            redis,
            ttl_seconds,
        }
    }

    async fn read_cached(&self, key: &str) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let cached: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        match cached {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_cached(&self, key: &str, snapshot: &MarketRateSnapshot) -> Result<(), MarketDataError> {
        let payload = serde_json::to_string(snapshot)?;
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_seconds)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

fn cache_key(skill: &str, experience_level: ExperienceLevel, location: Option<&str>) -> String {
    format!(
        "market_rate:{}:{}:{}",
        normalize_skill(skill),
        experience_level.as_str(),
        location.map(|l| l.trim().to_lowercase()).unwrap_or_else(|| "any".to_string())
    )
}

#[async_trait]
impl MarketDataProvider for CachedMarketDataProvider {
    async fn get_rate_data(
        &self,
        skill: &str,
        experience_level: ExperienceLevel,
        location: Option<&str>,
    ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
        let key = cache_key(skill, experience_level, location);

        match self.read_cached(&key).await {
            Ok(Some(snapshot)) => {
                debug!("Market rate cache hit: {key}");
                return Ok(Some(snapshot));
            }
            Ok(None) => debug!("Market rate cache miss: {key}"),
            Err(e) => warn!("Market rate cache read failed for {key}: {e}"),
        }

        let found = self
            .inner
            .get_rate_data(skill, experience_level, location)
            .await?;

        if let Some(snapshot) = &found {
            if let Err(e) = self.write_cached(&key, snapshot).await {
                warn!("Market rate cache write failed for {key}: {e}");
            }
        }

        Ok(found)
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}
