use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    #[default]
    Mid,
    Senior,
    Expert,
}

impl ExperienceLevel {
    /// Bucket used when looking up market data for a freelancer.
    pub fn from_years(years: u32) -> Self {
        match years {
            0..=1 => ExperienceLevel::Entry,
            2..=4 => ExperienceLevel::Mid,
            5..=9 => ExperienceLevel::Senior,
            _ => ExperienceLevel::Expert,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Expert => "expert",
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entry" | "junior" => Ok(ExperienceLevel::Entry),
            "mid" | "intermediate" => Ok(ExperienceLevel::Mid),
            "senior" => Ok(ExperienceLevel::Senior),
            "expert" => Ok(ExperienceLevel::Expert),
            other => Err(format!(
                "unknown experience_level '{other}'; expected entry, mid, senior, or expert"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateTrend {
    Rising,
    #[default]
    Stable,
    Declining,
}

impl RateTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateTrend::Rising => "rising",
            RateTrend::Stable => "stable",
            RateTrend::Declining => "declining",
        }
    }
}

impl FromStr for RateTrend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rising" | "up" => Ok(RateTrend::Rising),
            "stable" | "flat" => Ok(RateTrend::Stable),
            "declining" | "down" => Ok(RateTrend::Declining),
            other => Err(format!("unknown trend '{other}'")),
        }
    }
}

/// Percentile rate distribution for one skill, as reported by the market-data source.
/// Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRateSnapshot {
    pub skill: String,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    #[serde(default)]
    pub sample_size: u32,
    #[serde(default)]
    pub trend: RateTrend,
    pub last_updated: DateTime<Utc>,
}

pub const DEFAULT_MARKET_SKILL: &str = "default";

impl MarketRateSnapshot {
    /// Snapshot substituted when no requested skill resolves.
    pub fn fallback() -> Self {
        Self {
            skill: DEFAULT_MARKET_SKILL.to_string(),
            experience_level: ExperienceLevel::Mid,
            percentile_25: 35.0,
            percentile_50: 50.0,
            percentile_75: 75.0,
            percentile_90: 100.0,
            sample_size: 100,
            trend: RateTrend::Stable,
            last_updated: Utc::now(),
        }
    }

    /// Percentiles must be positive and non-decreasing to be usable.
    pub fn is_well_formed(&self) -> bool {
        let p = [
            self.percentile_25,
            self.percentile_50,
            self.percentile_75,
            self.percentile_90,
        ];
        p.iter().all(|v| v.is_finite() && *v > 0.0) && p.windows(2).all(|w| w[0] <= w[1])
    }

    /// An age limit chrono cannot represent never marks a snapshot stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        Duration::try_days(max_age_days).is_some_and(|max_age| now - self.last_updated > max_age)
    }
}
