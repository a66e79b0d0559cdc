//! Client for an upstream market-data service.
//!
//! `GET {base_url}/rates?skill=..&experience_level=..[&location=..]` returning a
//! `MarketRateSnapshot` as JSON, or 404 when the skill is unknown.
//! Retries on 429 and 5xx with exponential backoff; other failures return at once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{MarketDataError, MarketDataProvider};
use crate::models::market::{ExperienceLevel, MarketRateSnapshot};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpMarketDataProvider {
    client: Client,
    base_url: String,
}

impl HttpMarketDataProvider {
    pub fn new(base_url: &str) -> Result<Self, MarketDataError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn rates_url(&self) -> String {
        format!("{}/rates", self.base_url)
    }
}

fn query_params<'a>(
    skill: &'a str,
    experience_level: ExperienceLevel,
    location: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("skill", skill), ("experience_level", experience_level.as_str())];
    if let Some(location) = location {
        params.push(("location", location));
    }
    params
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn get_rate_data(
        &self,
        skill: &str,
        experience_level: ExperienceLevel,
        location: Option<&str>,
    ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
        let params = query_params(skill, experience_level, location);
        let mut last_error: Option<MarketDataError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 200ms, 400ms
                let delay = Duration::from_millis(200 * (1 << (attempt - 1)));
                warn!(
                    "Market data lookup for '{skill}' failed (attempt {attempt}), retrying after {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.get(self.rates_url()).query(&params).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(MarketDataError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                debug!("Upstream has no market data for '{skill}'");
                return Ok(None);
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(MarketDataError::Upstream {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(MarketDataError::Upstream {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let body = response.text().await?;
            let snapshot: MarketRateSnapshot = serde_json::from_str(&body)?;
            return Ok(Some(snapshot));
        }

        Err(last_error.unwrap_or(MarketDataError::Upstream {
            status: 0,
            message: format!("no response after {MAX_RETRIES} attempts"),
        }))
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}
