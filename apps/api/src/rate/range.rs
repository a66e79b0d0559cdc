//! Rate Range: derives the admissible `[min, max]` band (and a median) for a bid.
//!
//! Flow: market median → experience/rating/skill multipliers → 0.7×/1.4× band →
//!       budget clamps → competition and repeat-client adjustments → budget cap → reconcile.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::freelancer::FreelancerProfile;
use crate::models::job::{CompetitionLevel, JobContext};
use crate::models::market::MarketRateSnapshot;

/// Used when no market snapshot yields a usable median.
pub const DEFAULT_MARKET_MEDIAN: f64 = 50.0;
/// Skill match assumed when the job lists no required skills.
pub const DEFAULT_SKILL_MATCH: f64 = 0.7;

const BAND_LOW: f64 = 0.7;
const BAND_HIGH: f64 = 1.4;
/// When budget clamps invert the band, `min` is re-derived from `max` with the
/// base band's proportion (0.7 / 1.4).
const RECONCILED_FLOOR_RATIO: f64 = BAND_LOW / BAND_HIGH;

/// Invariant: `0 < min < max` and `min <= median <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRange {
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl RateRange {
    pub fn contains(&self, rate: f64) -> bool {
        rate >= self.min && rate <= self.max
    }
}

/// Fraction of the job's required skills present in the freelancer's skill set
/// (case-insensitive). `DEFAULT_SKILL_MATCH` when the job lists none.
pub fn skill_match_score(freelancer_skills: &[String], required_skills: &[String]) -> f64 {
    let required: HashSet<String> = required_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if required.is_empty() {
        return DEFAULT_SKILL_MATCH;
    }
    let owned: HashSet<String> = freelancer_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();
    let matched = required.intersection(&owned).count();
    matched as f64 / required.len() as f64
}

/// Mean `percentile_50` across the snapshots, ignoring non-positive medians.
pub fn market_median(snapshots: &[MarketRateSnapshot]) -> f64 {
    let medians: Vec<f64> = snapshots
        .iter()
        .map(|s| s.percentile_50)
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();
    if medians.is_empty() {
        DEFAULT_MARKET_MEDIAN
    } else {
        medians.iter().sum::<f64>() / medians.len() as f64
    }
}

/// Full range calculation for one freelancer/job pair.
pub fn compute_range(
    freelancer: &FreelancerProfile,
    market_rates: &[MarketRateSnapshot],
    job: &JobContext,
) -> RateRange {
    let skill_match = skill_match_score(&freelancer.skills, &job.skills_required);
    let base = base_range(freelancer, market_median(market_rates), skill_match);
    reconcile(adjust_for_job(base, job))
}

/// Profile-driven band around the market median, before any job constraints.
pub fn base_range(freelancer: &FreelancerProfile, market_median: f64, skill_match: f64) -> RateRange {
    let experience_multiplier = (1.0 + freelancer.experience_years as f64 * 0.05).min(2.0);
    // 4.5 rating → 0.99×
    let rating_multiplier = 0.9 + freelancer.rating / 50.0;
    let skill_multiplier = 0.8 + skill_match * 0.4;

    let median = market_median * experience_multiplier * rating_multiplier * skill_multiplier;

    RateRange {
        min: median * BAND_LOW,
        max: median * BAND_HIGH,
        median,
    }
}

/// Budget clamps, then competition and repeat-client adjustments.
/// May leave the band inverted; `reconcile` restores the invariant.
pub fn adjust_for_job(mut range: RateRange, job: &JobContext) -> RateRange {
    // at most a 10% stretch above the stated budget
    let budget_cap = job.known_budget_max().map(|budget_max| budget_max * 1.1);
    if let Some(cap) = budget_cap {
        range.max = range.max.min(cap);
    }
    if let Some(budget_min) = job.known_budget_min() {
        range.min = range.min.max(budget_min * 0.85);
    }

    match job.competition_level {
        CompetitionLevel::High => {
            range.min *= 0.9;
            range.median *= 0.95;
        }
        CompetitionLevel::Low => {
            range.median *= 1.1;
            range.max *= 1.15;
        }
        CompetitionLevel::Medium => {}
    }

    if job.is_repeat_client() {
        range.median *= 1.1;
    }

    // the low-competition stretch never lifts max past the budget cap
    if let Some(cap) = budget_cap {
        range.max = range.max.min(cap);
    }

    range
}

/// Restores `min < max` and `min <= median <= max`.
///
/// The upper bound reflects the client's ceiling and always wins: an inverted
/// band re-derives `min` from `max`, dropping the budget-min floor.
pub fn reconcile(mut range: RateRange) -> RateRange {
    if range.min >= range.max {
        tracing::debug!(
            "Rate range inverted after job adjustments (min {:.2} >= max {:.2}); re-deriving min",
            range.min,
            range.max
        );
        range.min = range.max * RECONCILED_FLOOR_RATIO;
    }
    range.median = range.median.clamp(range.min, range.max);
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::fixtures::{sample_freelancer, sample_job, snapshot};

    #[test]
    fn test_skill_match_full_partial_none() {
        let owned = vec!["Python".to_string(), "django".to_string(), "JavaScript".to_string()];
        assert_eq!(
            skill_match_score(&owned, &["python".to_string(), "DJANGO".to_string()]),
            1.0
        );
        assert_eq!(
            skill_match_score(&owned, &["python".to_string(), "rust".to_string()]),
            0.5
        );
        assert_eq!(skill_match_score(&owned, &["go".to_string()]), 0.0);
    }

    #[test]
    fn test_skill_match_defaults_when_job_lists_none() {
        assert_eq!(skill_match_score(&["python".to_string()], &[]), DEFAULT_SKILL_MATCH);
    }

    #[test]
    fn test_market_median_averages_p50() {
        let snapshots = vec![snapshot("python", 60.0), snapshot("django", 40.0)];
        assert_eq!(market_median(&snapshots), 50.0);
    }

    #[test]
    fn test_market_median_never_divides_by_zero() {
        assert_eq!(market_median(&[]), DEFAULT_MARKET_MEDIAN);
        assert_eq!(market_median(&[snapshot("broken", 0.0)]), DEFAULT_MARKET_MEDIAN);
    }

    #[test]
    fn test_base_range_multipliers() {
        // 50 × 1.25 × 0.994 × 1.2 = 74.55
        let range = base_range(&sample_freelancer(), 50.0, 1.0);
        assert!((range.median - 74.55).abs() < 1e-9);
        assert!((range.min - 52.185).abs() < 1e-9);
        assert!((range.max - 104.37).abs() < 1e-9);
    }

    #[test]
    fn test_experience_multiplier_capped_at_two() {
        let mut veteran = sample_freelancer();
        veteran.experience_years = 35;
        veteran.rating = 5.0;
        let range = base_range(&veteran, 50.0, 0.5);
        // 50 × 2.0 × 1.0 × 1.0
        assert!((range.median - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_balanced_default_range() {
        let range = compute_range(&sample_freelancer(), &[], &sample_job());
        assert!((range.min - 52.185).abs() < 1e-9);
        assert!((range.max - 88.0).abs() < 1e-9, "budget_max 80 × 1.1 binds");
        assert!((range.median - 74.55).abs() < 1e-9);
    }

    #[test]
    fn test_budget_max_below_natural_min_binds_and_reconciles() {
        let mut job = sample_job();
        job.budget_min = None;
        job.budget_max = Some(20.0);
        let range = compute_range(&sample_freelancer(), &[], &job);
        assert!((range.max - 22.0).abs() < 1e-9);
        assert!(range.min < range.max);
        assert!((range.min - 11.0).abs() < 1e-9);
        assert!(range.median <= range.max && range.median >= range.min);
    }

    #[test]
    fn test_budget_min_floor_raises_min() {
        let mut job = sample_job();
        job.budget_min = Some(70.0);
        job.budget_max = Some(120.0);
        let range = compute_range(&sample_freelancer(), &[], &job);
        assert!((range.min - 59.5).abs() < 1e-9);
    }

    #[test]
    fn test_budget_min_above_max_keeps_client_ceiling() {
        let mut job = sample_job();
        job.budget_min = Some(200.0);
        job.budget_max = Some(40.0);
        let range = reconcile(adjust_for_job(
            base_range(&sample_freelancer(), 50.0, 1.0),
            &job,
        ));
        assert!((range.max - 44.0).abs() < 1e-9);
        assert!(range.min < range.max);
    }

    #[test]
    fn test_high_competition_lowers_min_and_median() {
        let mut job = sample_job();
        job.budget_min = None;
        job.budget_max = None;
        job.competition_level = CompetitionLevel::High;
        let base = base_range(&sample_freelancer(), 50.0, 1.0);
        let adjusted = adjust_for_job(base, &job);
        assert!((adjusted.min - base.min * 0.9).abs() < 1e-9);
        assert!((adjusted.median - base.median * 0.95).abs() < 1e-9);
        assert_eq!(adjusted.max, base.max);
    }

    #[test]
    fn test_low_competition_and_repeat_client_raise_median() {
        let mut job = sample_job();
        job.budget_min = None;
        job.budget_max = None;
        job.competition_level = CompetitionLevel::Low;
        job.client_history.previous_contracts = 2;
        let base = base_range(&sample_freelancer(), 50.0, 1.0);
        let adjusted = adjust_for_job(base, &job);
        assert!((adjusted.median - base.median * 1.1 * 1.1).abs() < 1e-9);
        assert!((adjusted.max - base.max * 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_low_competition_stretch_respects_budget_cap() {
        let mut job = sample_job();
        job.budget_min = None;
        job.budget_max = Some(20.0);
        job.competition_level = CompetitionLevel::Low;
        let range = compute_range(&sample_freelancer(), &[], &job);
        assert!((range.max - 22.0).abs() < 1e-9, "max {}", range.max);
        assert!(range.min < range.max);
        assert!(range.median >= range.min && range.median <= range.max);
    }

    #[test]
    fn test_low_competition_stretch_below_cap_is_kept() {
        let mut job = sample_job();
        job.budget_min = None;
        job.budget_max = Some(200.0);
        job.competition_level = CompetitionLevel::Low;
        let base = base_range(&sample_freelancer(), 50.0, 1.0);
        let adjusted = adjust_for_job(base, &job);
        // 104.37 × 1.15 = 120.03, under the 220 cap
        assert!((adjusted.max - base.max * 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_reconcile_clamps_median_into_band() {
        let range = reconcile(RateRange {
            min: 40.0,
            max: 60.0,
            median: 75.0,
        });
        assert_eq!(range.median, 60.0);
    }
}
