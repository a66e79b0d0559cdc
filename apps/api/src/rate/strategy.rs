//! Strategy Selector: picks one point from a win curve.
//!
//! `competitive` maximises win probability, `balanced` maximises expected value,
//! and `premium` takes the highest rate that still clears `PREMIUM_WIN_FLOOR`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::curve::WinCurvePoint;

/// Minimum win probability a premium pick must keep.
pub const PREMIUM_WIN_FLOOR: f64 = 0.30;
/// Confidence attached to every selection. Not yet scaled by market sample size.
pub const SELECTION_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateStrategy {
    Competitive,
    #[default]
    Balanced,
    Premium,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown strategy '{0}'; expected competitive, balanced, or premium")]
pub struct InvalidStrategy(pub String);

impl RateStrategy {
    pub const ALL: [RateStrategy; 3] = [
        RateStrategy::Competitive,
        RateStrategy::Balanced,
        RateStrategy::Premium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateStrategy::Competitive => "competitive",
            RateStrategy::Balanced => "balanced",
            RateStrategy::Premium => "premium",
        }
    }

    /// One-line trade-off shown next to alternative picks.
    pub fn description(&self) -> &'static str {
        match self {
            RateStrategy::Competitive => "Lower rate, higher chance of winning",
            RateStrategy::Balanced => "Best balance of rate and win probability",
            RateStrategy::Premium => "Higher rate, maximize earnings per project",
        }
    }
}

impl fmt::Display for RateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateStrategy {
    type Err = InvalidStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "competitive" => Ok(RateStrategy::Competitive),
            "balanced" => Ok(RateStrategy::Balanced),
            "premium" => Ok(RateStrategy::Premium),
            _ => Err(InvalidStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub point: WinCurvePoint,
    pub confidence: f64,
}

/// Returns `None` only for an empty curve.
pub fn select(curve: &[WinCurvePoint], strategy: RateStrategy) -> Option<Selection> {
    let point = match strategy {
        RateStrategy::Competitive => first_max_by(curve, |p| p.win_probability),
        RateStrategy::Balanced => first_max_by(curve, |p| p.expected_value),
        RateStrategy::Premium => premium_pick(curve),
    }?;

    Some(Selection {
        point: *point,
        confidence: SELECTION_CONFIDENCE,
    })
}

/// Argmax keeping the earliest (lowest-rate) point among ties.
fn first_max_by<F>(curve: &[WinCurvePoint], key: F) -> Option<&WinCurvePoint>
where
    F: Fn(&WinCurvePoint) -> f64,
{
    curve.iter().fold(None, |best, point| match best {
        Some(b) if key(point) <= key(b) => Some(b),
        _ => Some(point),
    })
}

fn premium_pick(curve: &[WinCurvePoint]) -> Option<&WinCurvePoint> {
    curve
        .iter()
        .filter(|p| p.win_probability >= PREMIUM_WIN_FLOOR)
        .max_by(|a, b| a.rate.total_cmp(&b.rate))
        // nothing viable: middle sample
        .or_else(|| curve.get(curve.len().saturating_sub(1) / 2))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeStrategy {
    pub strategy: RateStrategy,
    pub rate: f64,
    pub win_probability: f64,
    pub description: &'static str,
}

/// Selections for the two strategies that were not chosen, in `RateStrategy::ALL` order.
pub fn alternatives(curve: &[WinCurvePoint], chosen: RateStrategy) -> Vec<AlternativeStrategy> {
    RateStrategy::ALL
        .iter()
        .filter(|s| **s != chosen)
        .filter_map(|s| {
            select(curve, *s).map(|selection| AlternativeStrategy {
                strategy: *s,
                rate: selection.point.rate,
                win_probability: selection.point.win_probability,
                description: s.description(),
            })
        })
        .collect()
}
