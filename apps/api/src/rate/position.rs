use serde::Serialize;

use crate::models::market::MarketRateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketPosition {
    Below,
    At,
    Above,
}

impl MarketPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketPosition::Below => "below",
            MarketPosition::At => "at",
            MarketPosition::Above => "above",
        }
    }
}

/// Where a rate sits in the market distribution. `percentile` is one of the
/// fixed buckets 25, 35, 55, 80, 95.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketStanding {
    pub position: MarketPosition,
    pub percentile: u8,
}

pub fn classify(rate: f64, market: &MarketRateSnapshot) -> MarketStanding {
    let (position, percentile) = if rate < market.percentile_25 {
        (MarketPosition::Below, 25)
    } else if rate < market.percentile_50 {
        (MarketPosition::Below, 35)
    } else if rate < market.percentile_75 {
        (MarketPosition::At, 55)
    } else if rate < market.percentile_90 {
        (MarketPosition::Above, 80)
    } else {
        (MarketPosition::Above, 95)
    };
    MarketStanding {
        position,
        percentile,
    }
}

/// Percentile-wise mean of the resolved snapshots, used as the single reference
/// band when a job spans several skills. `None` for an empty slice.
pub fn blended_band(snapshots: &[MarketRateSnapshot]) -> Option<MarketRateSnapshot> {
    let first = snapshots.first()?;
    if snapshots.len() == 1 {
        return Some(first.clone());
    }
    let n = snapshots.len() as f64;
    let mean = |f: fn(&MarketRateSnapshot) -> f64| snapshots.iter().map(f).sum::<f64>() / n;

    Some(MarketRateSnapshot {
        percentile_25: mean(|s| s.percentile_25),
        percentile_50: mean(|s| s.percentile_50),
        percentile_75: mean(|s| s.percentile_75),
        percentile_90: mean(|s| s.percentile_90),
        sample_size: snapshots.iter().map(|s| s.sample_size).sum(),
        last_updated: snapshots
            .iter()
            .map(|s| s.last_updated)
            .min()
            .unwrap_or(first.last_updated),
        ..first.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::fixtures::snapshot;

    #[test]
    fn test_bucket_table_against_default_market() {
        let market = MarketRateSnapshot::fallback();
        let cases = [
            (20.0, MarketPosition::Below, 25),
            (35.0, MarketPosition::Below, 35),
            (49.99, MarketPosition::Below, 35),
            (50.0, MarketPosition::At, 55),
            (74.0, MarketPosition::At, 55),
            (75.0, MarketPosition::Above, 80),
            (100.0, MarketPosition::Above, 95),
            (250.0, MarketPosition::Above, 95),
        ];
        for (rate, position, percentile) in cases {
            assert_eq!(
                classify(rate, &market),
                MarketStanding { position, percentile },
                "rate {rate}"
            );
        }
    }

    #[test]
    fn test_blended_band_averages_percentiles() {
        let band = blended_band(&[snapshot("python", 60.0), snapshot("django", 40.0)]).unwrap();
        assert!((band.percentile_50 - 50.0).abs() < 1e-9);
        assert!((band.percentile_25 - 35.0).abs() < 1e-9);
        assert_eq!(band.sample_size, 1000);
        assert!(blended_band(&[]).is_none());
    }
}
