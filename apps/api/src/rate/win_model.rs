//! Win Probability Model: pluggable, trait-based estimate of P(win | rate, features).
//!
//! Default: `HeuristicWinModel` (additive, bounded terms; fully explainable).
//! Learned: `LogisticWinModel` (weights loaded from JSON at startup).
//!
//! `RateOptimizerService` holds an `Arc<dyn WinProbabilityModel>`, chosen in `main`.
//! Every variant clamps to `[MIN_WIN_PROBABILITY, MAX_WIN_PROBABILITY]`: a model
//! must never claim certainty in either direction.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::freelancer::FreelancerProfile;
use crate::models::job::{CompetitionLevel, JobContext};

pub const MIN_WIN_PROBABILITY: f64 = 0.05;
pub const MAX_WIN_PROBABILITY: f64 = 0.85;

const BASE_PROBABILITY: f64 = 0.5;

// ────────────────────────────────────────────────────────────────────────────
// Feature bundle
// ────────────────────────────────────────────────────────────────────────────

/// Inputs to a win prediction at one candidate rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateFeatures {
    pub proposed_rate: f64,
    /// proposed ÷ budget midpoint; 0 when the budget is unknown.
    pub rate_vs_budget: f64,
    /// proposed ÷ market median.
    pub rate_vs_market: f64,
    /// proposed ÷ freelancer's usual rate.
    pub rate_vs_average: f64,
    pub experience_years: u32,
    pub rating: f64,
    pub skill_match_score: f64,
    pub historical_win_rate: f64,
    pub completion_rate: f64,
    pub competition_level: CompetitionLevel,
    pub days_since_posted: u32,
}

/// The rate-independent part of `RateFeatures`, built once per request and
/// instantiated at each candidate rate.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBasis {
    budget_midpoint: Option<f64>,
    market_median: f64,
    average_rate: f64,
    experience_years: u32,
    rating: f64,
    skill_match_score: f64,
    historical_win_rate: f64,
    completion_rate: f64,
    competition_level: CompetitionLevel,
    days_since_posted: u32,
}

impl FeatureBasis {
    pub fn new(
        job: &JobContext,
        freelancer: &FreelancerProfile,
        skill_match_score: f64,
        market_median: f64,
    ) -> Self {
        Self {
            budget_midpoint: job.budget_midpoint(),
            market_median,
            average_rate: freelancer.average_rate,
            experience_years: freelancer.experience_years,
            rating: freelancer.rating,
            skill_match_score,
            historical_win_rate: freelancer.historical_win_rate,
            completion_rate: freelancer.completion_rate,
            competition_level: job.competition_level,
            days_since_posted: job.days_since_posted,
        }
    }

    pub fn at(&self, rate: f64) -> RateFeatures {
        RateFeatures {
            proposed_rate: rate,
            rate_vs_budget: self.budget_midpoint.map(|mid| rate / mid).unwrap_or(0.0),
            rate_vs_market: ratio_or_one(rate, self.market_median),
            rate_vs_average: ratio_or_one(rate, self.average_rate),
            experience_years: self.experience_years,
            rating: self.rating,
            skill_match_score: self.skill_match_score,
            historical_win_rate: self.historical_win_rate,
            completion_rate: self.completion_rate,
            competition_level: self.competition_level,
            days_since_posted: self.days_since_posted,
        }
    }
}

fn ratio_or_one(value: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        value / reference
    } else {
        1.0
    }
}

pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return MIN_WIN_PROBABILITY;
    }
    p.clamp(MIN_WIN_PROBABILITY, MAX_WIN_PROBABILITY)
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap prediction backends without touching range
/// calculation, curve sampling, or strategy selection.
#[async_trait]
pub trait WinProbabilityModel: Send + Sync {
    async fn predict(&self, features: &RateFeatures) -> f64;

    /// "heuristic" or "logistic", surfaced on the health endpoint.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicWinModel
// ────────────────────────────────────────────────────────────────────────────

/// Additive heuristic: base 0.5 plus independently bounded terms, then clamped.
pub struct HeuristicWinModel;

/// Each heuristic contribution before summing.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeuristicTerms {
    rate: f64,
    experience: f64,
    rating: f64,
    skill_match: f64,
    history: f64,
    competition: f64,
    recency: f64,
}

impl HeuristicTerms {
    fn from_features(features: &RateFeatures) -> Self {
        Self {
            rate: rate_term(features.rate_vs_budget),
            experience: (features.experience_years as f64 * 0.02).min(0.15),
            rating: (features.rating - 4.0) * 0.05,
            skill_match: (features.skill_match_score - 0.5) * 0.20,
            history: (features.historical_win_rate - 0.3) * 0.15,
            competition: match features.competition_level {
                CompetitionLevel::Low => 0.15,
                CompetitionLevel::Medium => 0.0,
                CompetitionLevel::High => -0.15,
            },
            recency: (-(features.days_since_posted as f64) * 0.01).max(-0.10),
        }
    }

    fn total(&self) -> f64 {
        self.rate
            + self.experience
            + self.rating
            + self.skill_match
            + self.history
            + self.competition
            + self.recency
    }
}

/// Monotonically penalises pricing above the stated budget.
fn rate_term(rate_vs_budget: f64) -> f64 {
    if rate_vs_budget <= 0.0 {
        0.0 // budget unknown
    } else if rate_vs_budget < 0.8 {
        0.20
    } else if rate_vs_budget <= 1.0 {
        0.10
    } else if rate_vs_budget <= 1.2 {
        -0.10
    } else {
        -0.25
    }
}

pub fn heuristic_probability(features: &RateFeatures) -> f64 {
    clamp_probability(BASE_PROBABILITY + HeuristicTerms::from_features(features).total())
}

#[async_trait]
impl WinProbabilityModel for HeuristicWinModel {
    async fn predict(&self, features: &RateFeatures) -> f64 {
        heuristic_probability(features)
    }

    fn backend(&self) -> &'static str {
        "heuristic"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LogisticWinModel
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum WinModelError {
    #[error("failed to read model weights: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model weights: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model weight '{0}' is not a finite number")]
    NonFinite(&'static str),
}

/// Coefficients of a logistic regression trained offline on bid outcomes.
/// Missing coefficients default to 0 (feature ignored).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticWeights {
    pub version: String,
    pub intercept: f64,
    pub rate_vs_budget: f64,
    pub rate_vs_market: f64,
    pub rate_vs_average: f64,
    pub experience_years: f64,
    pub rating: f64,
    pub skill_match_score: f64,
    pub historical_win_rate: f64,
    pub completion_rate: f64,
    /// One-hot against the `medium` baseline.
    pub competition_low: f64,
    pub competition_high: f64,
    pub days_since_posted: f64,
}

impl LogisticWeights {
    fn named(&self) -> [(&'static str, f64); 12] {
        [
            ("intercept", self.intercept),
            ("rate_vs_budget", self.rate_vs_budget),
            ("rate_vs_market", self.rate_vs_market),
            ("rate_vs_average", self.rate_vs_average),
            ("experience_years", self.experience_years),
            ("rating", self.rating),
            ("skill_match_score", self.skill_match_score),
            ("historical_win_rate", self.historical_win_rate),
            ("completion_rate", self.completion_rate),
            ("competition_low", self.competition_low),
            ("competition_high", self.competition_high),
            ("days_since_posted", self.days_since_posted),
        ]
    }
}

pub struct LogisticWinModel {
    weights: LogisticWeights,
}

impl LogisticWinModel {
    pub fn new(weights: LogisticWeights) -> Result<Self, WinModelError> {
        if let Some((name, _)) = weights.named().iter().find(|(_, w)| !w.is_finite()) {
            return Err(WinModelError::NonFinite(*name));
        }
        Ok(Self { weights })
    }

    pub fn from_file(path: &Path) -> Result<Self, WinModelError> {
        let raw = std::fs::read_to_string(path)?;
        Self::new(serde_json::from_str(&raw)?)
    }

    pub fn version(&self) -> &str {
        &self.weights.version
    }

    fn logit(&self, f: &RateFeatures) -> f64 {
        let w = &self.weights;
        let (low, high) = match f.competition_level {
            CompetitionLevel::Low => (1.0, 0.0),
            CompetitionLevel::Medium => (0.0, 0.0),
            CompetitionLevel::High => (0.0, 1.0),
        };
        w.intercept
            + w.rate_vs_budget * f.rate_vs_budget
            + w.rate_vs_market * f.rate_vs_market
            + w.rate_vs_average * f.rate_vs_average
            + w.experience_years * f.experience_years as f64
            + w.rating * f.rating
            + w.skill_match_score * f.skill_match_score
            + w.historical_win_rate * f.historical_win_rate
            + w.completion_rate * f.completion_rate
            + w.competition_low * low
            + w.competition_high * high
            + w.days_since_posted * f.days_since_posted as f64
    }
}

#[async_trait]
impl WinProbabilityModel for LogisticWinModel {
    async fn predict(&self, features: &RateFeatures) -> f64 {
        let z = self.logit(features);
        clamp_probability(1.0 / (1.0 + (-z).exp()))
    }

    fn backend(&self) -> &'static str {
        "logistic"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
