use futures::future::join_all;
use serde::Serialize;

use super::range::RateRange;
use super::win_model::{FeatureBasis, WinProbabilityModel};

pub const DEFAULT_SAMPLES: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinCurvePoint {
    pub rate: f64,
    pub win_probability: f64,
    /// rate × win_probability
    pub expected_value: f64,
}

/// Equally spaced rates across `[min, max]`, both ends included.
///
/// Cheap to clone, so the grid can be walked again without recomputing the range.
#[derive(Debug, Clone)]
pub struct RateGrid {
    min: f64,
    max: f64,
    samples: usize,
    next: usize,
}

impl RateGrid {
    pub fn new(range: &RateRange, samples: usize) -> Self {
        Self {
            min: range.min,
            max: range.max,
            samples,
            next: 0,
        }
    }

    fn rate_at(&self, index: usize) -> f64 {
        if self.samples <= 1 {
            return self.min;
        }
        if index == self.samples - 1 {
            // exact upper bound, no accumulated step error
            return self.max;
        }
        let step = (self.max - self.min) / (self.samples - 1) as f64;
        self.min + step * index as f64
    }
}

impl Iterator for RateGrid {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next >= self.samples {
            return None;
        }
        let rate = self.rate_at(self.next);
        self.next += 1;
        Some(rate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RateGrid {}

/// Evaluates the model at every grid rate.
///
/// Predictions run concurrently; `join_all` yields results in input order, so the
/// curve stays ascending by rate whatever order the predictions finish in.
pub async fn sample_curve(
    range: &RateRange,
    basis: &FeatureBasis,
    model: &dyn WinProbabilityModel,
    n_samples: usize,
) -> Vec<WinCurvePoint> {
    let predictions = RateGrid::new(range, n_samples).map(|rate| async move {
        let features = basis.at(rate);
        let win_probability = model.predict(&features).await;
        WinCurvePoint {
            rate,
            win_probability,
            expected_value: rate * win_probability,
        }
    });

    join_all(predictions).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::rate::fixtures::{sample_freelancer, sample_job};
    use crate::rate::win_model::{HeuristicWinModel, RateFeatures};

    fn range() -> RateRange {
        RateRange {
            min: 52.185,
            max: 88.0,
            median: 74.55,
        }
    }

    fn basis() -> FeatureBasis {
        FeatureBasis::new(&sample_job(), &sample_freelancer(), 1.0, 50.0)
    }

    #[test]
    fn test_grid_spans_range_inclusive() {
        let rates: Vec<f64> = RateGrid::new(&range(), DEFAULT_SAMPLES).collect();
        assert_eq!(rates.len(), DEFAULT_SAMPLES);
        assert_eq!(rates[0], 52.185);
        assert_eq!(rates[10], 88.0);
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_is_restartable() {
        let grid = RateGrid::new(&range(), 5);
        assert_eq!(grid.len(), 5);
        let first: Vec<f64> = grid.clone().collect();
        let second: Vec<f64> = grid.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_sample_grid_is_min() {
        let rates: Vec<f64> = RateGrid::new(&range(), 1).collect();
        assert_eq!(rates, vec![52.185]);
    }

    #[tokio::test]
    async fn test_curve_points_carry_expected_value() {
        let curve = sample_curve(&range(), &basis(), &HeuristicWinModel, DEFAULT_SAMPLES).await;
        assert_eq!(curve.len(), DEFAULT_SAMPLES);
        for point in &curve {
            assert!((point.expected_value - point.rate * point.win_probability).abs() < 1e-9);
            assert!((0.05..=0.85).contains(&point.win_probability));
        }
        // 52.185 / 55 ≈ 0.95 of the budget midpoint → +0.10 on a 0.7425 baseline
        assert!((curve[0].win_probability - 0.8425).abs() < 1e-9);
    }

    /// Finishes high rates first so a naive collector would return them reversed.
    struct SlowForCheapRates;

    #[async_trait]
    impl WinProbabilityModel for SlowForCheapRates {
        async fn predict(&self, features: &RateFeatures) -> f64 {
            let delay = (200.0 - features.proposed_rate).max(0.0) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            0.5
        }

        fn backend(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_predictions_keep_rate_order() {
        let curve = sample_curve(&range(), &basis(), &SlowForCheapRates, DEFAULT_SAMPLES).await;
        assert!(curve.windows(2).all(|w| w[0].rate < w[1].rate));
        assert_eq!(curve.last().map(|p| p.rate), Some(88.0));
    }
}
