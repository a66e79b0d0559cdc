//! Rate Optimizer Service. Orchestrates market lookup, range, curve and selection.
//!
//! Built once in `main` with its collaborators injected and shared through
//! `AppState`. Every call is independent: no request-to-request state.
//!
//! Market data is best-effort. Lookups run concurrently under a per-lookup
//! timeout; failures, timeouts and malformed snapshots are logged and treated as
//! missing, and a request that resolves nothing falls back to the default market.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::market_data::{normalize_skill, MarketDataError, MarketDataProvider};
use crate::models::freelancer::FreelancerProfile;
use crate::models::job::JobContext;
use crate::models::market::{ExperienceLevel, MarketRateSnapshot};

use super::curve::{sample_curve, DEFAULT_SAMPLES};
use super::position::{blended_band, classify, MarketStanding};
use super::range::{compute_range, market_median, skill_match_score, RateRange};
use super::reasoning::{analysis_recommendations, recommendation_reasoning, RecommendationFacts};
use super::strategy::{alternatives, select, AlternativeStrategy, RateStrategy};
use super::win_model::{FeatureBasis, WinProbabilityModel};

/// Search bounds and policy for `find_rate_for_target_win_probability`.
pub const TARGET_SEARCH_LOW: f64 = 20.0;
pub const TARGET_SEARCH_HIGH: f64 = 200.0;
pub const TARGET_SEARCH_ITERATIONS: u32 = 20;
pub const TARGET_SEARCH_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct RateRecommendation {
    pub recommended_rate: f64,
    pub rate_range: RateRange,
    pub win_probability: f64,
    pub expected_value: f64,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub alternatives: Vec<AlternativeStrategy>,
    pub strategy: RateStrategy,
    pub market_position: MarketStanding,
    pub used_default_market_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitiveAnalysis {
    pub market_median: f64,
    pub rate_vs_market: f64,
    /// `None` when the job states no budget.
    pub rate_vs_budget: Option<f64>,
    pub win_rate_at_this_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateAnalysis {
    pub proposed_rate: f64,
    pub win_probability: f64,
    pub expected_value: f64,
    pub market_position: MarketStanding,
    pub competitive_analysis: CompetitiveAnalysis,
    pub recommendations: Vec<String>,
    pub used_default_market_data: bool,
}

/// Outcome of the approximate inversion of the win model.
///
/// The model is not monotonic in rate once all terms combine, so `converged`
/// may be false; `rate` is then the last midpoint examined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetRateSearch {
    pub rate: f64,
    pub predicted_win_probability: f64,
    pub converged: bool,
    pub iterations: u32,
}

/// Snapshots resolved for one request.
#[derive(Debug, Clone)]
struct MarketContext {
    snapshots: Vec<MarketRateSnapshot>,
    used_default: bool,
}

impl MarketContext {
    fn median(&self) -> f64 {
        market_median(&self.snapshots)
    }

    fn band(&self) -> MarketRateSnapshot {
        blended_band(&self.snapshots).unwrap_or_else(MarketRateSnapshot::fallback)
    }
}

pub struct RateOptimizerService {
    model: Arc<dyn WinProbabilityModel>,
    market: Arc<dyn MarketDataProvider>,
    market_timeout: Duration,
    max_age_days: i64,
}

impl RateOptimizerService {
    pub fn new(
        model: Arc<dyn WinProbabilityModel>,
        market: Arc<dyn MarketDataProvider>,
        market_timeout: Duration,
        max_age_days: i64,
    ) -> Self {
        Self {
            model,
            market,
            market_timeout,
            max_age_days,
        }
    }

    pub fn model_backend(&self) -> &'static str {
        self.model.backend()
    }

    pub fn market_backend(&self) -> &'static str {
        self.market.backend()
    }

    /// Recommended rate for `job` under `strategy`, with reasoning and the
    /// picks the other two strategies would have made.
    pub async fn get_optimal_rate(
        &self,
        job: &JobContext,
        freelancer: &FreelancerProfile,
        strategy: RateStrategy,
    ) -> Result<RateRecommendation, AppError> {
        let level = ExperienceLevel::from_years(freelancer.experience_years);
        let market = self.resolve_market_rates(&job.skills_required, level).await;

        let skill_match = skill_match_score(&freelancer.skills, &job.skills_required);
        let range = compute_range(freelancer, &market.snapshots, job);
        let basis = FeatureBasis::new(job, freelancer, skill_match, market.median());

        let curve = sample_curve(&range, &basis, self.model.as_ref(), DEFAULT_SAMPLES).await;
        let selection = select(&curve, strategy)
            .ok_or_else(|| AppError::Internal(anyhow!("win curve for job {} is empty", job.job_id)))?;
        let point = selection.point;
        debug_assert!(range.contains(point.rate));

        let reasoning = recommendation_reasoning(&RecommendationFacts {
            job,
            freelancer,
            rate: point.rate,
            win_probability: point.win_probability,
            used_default_market_data: market.used_default,
        });

        let recommendation = RateRecommendation {
            recommended_rate: point.rate,
            rate_range: range,
            win_probability: point.win_probability,
            expected_value: point.expected_value,
            confidence: selection.confidence,
            reasoning,
            alternatives: alternatives(&curve, strategy),
            strategy,
            market_position: classify(point.rate, &market.band()),
            used_default_market_data: market.used_default,
        };

        info!(
            event = "rate_optimizer.recommendation_generated",
            job_id = %job.job_id,
            strategy = %strategy,
            competition = job.competition_level.as_str(),
            rate = recommendation.recommended_rate,
            win_probability = recommendation.win_probability,
            "Rate recommendation generated"
        );

        Ok(recommendation)
    }

    /// Win probability and market standing of a rate the freelancer proposes.
    pub async fn analyze_rate(
        &self,
        proposed_rate: f64,
        job: &JobContext,
        freelancer: &FreelancerProfile,
    ) -> RateAnalysis {
        let level = ExperienceLevel::from_years(freelancer.experience_years);
        let market = self.resolve_market_rates(&job.skills_required, level).await;
        let median = market.median();

        let skill_match = skill_match_score(&freelancer.skills, &job.skills_required);
        let features = FeatureBasis::new(job, freelancer, skill_match, median).at(proposed_rate);
        let win_probability = self.model.predict(&features).await;
        let standing = classify(proposed_rate, &market.band());

        info!(
            event = "rate_optimizer.rate_analyzed",
            job_id = %job.job_id,
            proposed_rate,
            position = standing.position.as_str(),
            "Proposed rate analyzed"
        );

        RateAnalysis {
            proposed_rate,
            win_probability,
            expected_value: proposed_rate * win_probability,
            market_position: standing,
            competitive_analysis: CompetitiveAnalysis {
                market_median: median,
                rate_vs_market: features.rate_vs_market,
                rate_vs_budget: job.budget_midpoint().map(|_| features.rate_vs_budget),
                win_rate_at_this_price: win_probability,
            },
            recommendations: analysis_recommendations(win_probability, &standing),
            used_default_market_data: market.used_default,
        }
    }

    /// Direct pass-through to the market collaborator, bounded by the lookup timeout.
    pub async fn get_market_rate(
        &self,
        skill: &str,
        experience_level: ExperienceLevel,
        location: Option<&str>,
    ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
        tokio::time::timeout(
            self.market_timeout,
            self.market.get_rate_data(skill, experience_level, location),
        )
        .await
        .map_err(|_| MarketDataError::Timeout(self.market_timeout.as_millis()))?
    }

    pub fn is_stale(&self, snapshot: &MarketRateSnapshot) -> bool {
        snapshot.is_stale(Utc::now(), self.max_age_days)
    }

    /// Bisects `[20, 200]` for a rate whose predicted win probability is within
    /// 0.05 of `target`. Best-effort: stops after 20 iterations regardless.
    pub async fn find_rate_for_target_win_probability(
        &self,
        job: &JobContext,
        freelancer: &FreelancerProfile,
        target: f64,
    ) -> TargetRateSearch {
        let level = ExperienceLevel::from_years(freelancer.experience_years);
        let market = self.resolve_market_rates(&job.skills_required, level).await;
        let skill_match = skill_match_score(&freelancer.skills, &job.skills_required);
        let basis = FeatureBasis::new(job, freelancer, skill_match, market.median());

        let (mut low, mut high) = (TARGET_SEARCH_LOW, TARGET_SEARCH_HIGH);
        let mut last = TargetRateSearch {
            rate: (low + high) / 2.0,
            predicted_win_probability: 0.0,
            converged: false,
            iterations: 0,
        };

        for iteration in 1..=TARGET_SEARCH_ITERATIONS {
            let mid = (low + high) / 2.0;
            let prob = self.model.predict(&basis.at(mid)).await;
            last = TargetRateSearch {
                rate: mid,
                predicted_win_probability: prob,
                converged: (prob - target).abs() < TARGET_SEARCH_TOLERANCE,
                iterations: iteration,
            };
            if last.converged {
                break;
            }
            // higher rate → lower win probability
            if prob > target {
                low = mid;
            } else {
                high = mid;
            }
        }

        if !last.converged {
            debug!(
                "Target win probability {target:.2} not reached for job {}; best midpoint {:.2} (p={:.3})",
                job.job_id, last.rate, last.predicted_win_probability
            );
        }
        last
    }

    async fn resolve_market_rates(&self, skills: &[String], level: ExperienceLevel) -> MarketContext {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && seen.insert(normalize_skill(s)))
            .collect();

        let lookups = unique.iter().map(|skill| async move {
            let result = tokio::time::timeout(
                self.market_timeout,
                self.market.get_rate_data(skill, level, None),
            )
            .await;
            (*skill, result)
        });

        let now = Utc::now();
        let mut snapshots = Vec::with_capacity(unique.len());
        for (skill, result) in join_all(lookups).await {
            match result {
                Ok(Ok(Some(snapshot))) if snapshot.is_well_formed() => {
                    if snapshot.is_stale(now, self.max_age_days) {
                        warn!(
                            "Market data for '{skill}' is stale (last updated {}); using it anyway",
                            snapshot.last_updated
                        );
                    }
                    snapshots.push(snapshot);
                }
                Ok(Ok(Some(_))) => warn!("Ignoring malformed market data for '{skill}'"),
                Ok(Ok(None)) => debug!("No market data for '{skill}'"),
                Ok(Err(e)) => warn!("Market data lookup for '{skill}' failed: {e}"),
                Err(_) => warn!(
                    "Market data lookup for '{skill}' timed out after {}ms",
                    self.market_timeout.as_millis()
                ),
            }
        }

        if snapshots.is_empty() {
            debug!("No market data resolved for {:?}; using defaults", unique);
            return MarketContext {
                snapshots: vec![MarketRateSnapshot::fallback()],
                used_default: true,
            };
        }

        MarketContext {
            snapshots,
            used_default: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::market_data::InMemoryMarketDataProvider;
    use crate::models::job::CompetitionLevel;
    use crate::models::market::DEFAULT_MARKET_SKILL;
    use crate::rate::fixtures::{sample_freelancer, sample_job, snapshot};
    use crate::rate::position::MarketPosition;
    use crate::rate::win_model::{HeuristicWinModel, MAX_WIN_PROBABILITY, MIN_WIN_PROBABILITY};

    fn service(market: impl MarketDataProvider + 'static) -> RateOptimizerService {
        RateOptimizerService::new(
            Arc::new(HeuristicWinModel),
            Arc::new(market),
            Duration::from_millis(2000),
            30,
        )
    }

    fn empty_market() -> RateOptimizerService {
        service(InMemoryMarketDataProvider::new())
    }

    struct SlowMarket;

    #[async_trait]
    impl MarketDataProvider for SlowMarket {
        async fn get_rate_data(
            &self,
            skill: &str,
            _experience_level: ExperienceLevel,
            _location: Option<&str>,
        ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Some(snapshot(skill, 90.0)))
        }

        fn backend(&self) -> &'static str {
            "slow"
        }
    }

    struct BrokenMarket;

    #[async_trait]
    impl MarketDataProvider for BrokenMarket {
        async fn get_rate_data(
            &self,
            _skill: &str,
            _experience_level: ExperienceLevel,
            _location: Option<&str>,
        ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
            Err(MarketDataError::Upstream {
                status: 503,
                message: "maintenance".to_string(),
            })
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_balanced_default_scenario() {
        let rec = empty_market()
            .get_optimal_rate(&sample_job(), &sample_freelancer(), RateStrategy::Balanced)
            .await
            .unwrap();

        assert!(rec.used_default_market_data);
        assert!((rec.rate_range.min - 52.185).abs() < 1e-9);
        assert!((rec.rate_range.max - 88.0).abs() < 1e-9);
        assert!(rec.rate_range.contains(rec.recommended_rate));
        assert!((rec.recommended_rate - 52.185).abs() < 1e-9);
        assert!((rec.win_probability - 0.8425).abs() < 1e-9);
        assert!((MIN_WIN_PROBABILITY..=MAX_WIN_PROBABILITY).contains(&rec.win_probability));
        assert_eq!(rec.confidence, 0.75);
        assert_eq!(rec.strategy, RateStrategy::Balanced);
        assert_eq!(rec.market_position.position, MarketPosition::At);
        assert_eq!(rec.market_position.percentile, 55);
        assert_eq!(rec.alternatives.len(), 2);
        assert!(rec.reasoning.last().is_some_and(|l| l.contains("84%")));
    }

    #[tokio::test]
    async fn test_premium_picks_top_of_range_when_viable() {
        let rec = empty_market()
            .get_optimal_rate(&sample_job(), &sample_freelancer(), RateStrategy::Premium)
            .await
            .unwrap();
        assert!((rec.recommended_rate - 88.0).abs() < 1e-9);
        assert!((rec.win_probability - 0.4925).abs() < 1e-9);
        assert_eq!(rec.market_position.percentile, 80);
        let alt: Vec<RateStrategy> = rec.alternatives.iter().map(|a| a.strategy).collect();
        assert_eq!(alt, vec![RateStrategy::Competitive, RateStrategy::Balanced]);
    }

    #[tokio::test]
    async fn test_recommendation_is_idempotent() {
        let service = empty_market();
        let job = sample_job();
        let freelancer = sample_freelancer();
        let first = service
            .get_optimal_rate(&job, &freelancer, RateStrategy::Competitive)
            .await
            .unwrap();
        let second = service
            .get_optimal_rate(&job, &freelancer, RateStrategy::Competitive)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_known_skills_use_market_data() {
        let market = InMemoryMarketDataProvider::from_snapshots(vec![
            snapshot("python", 60.0),
            snapshot("django", 40.0),
        ]);
        let rec = service(market)
            .get_optimal_rate(&sample_job(), &sample_freelancer(), RateStrategy::Balanced)
            .await
            .unwrap();
        assert!(!rec.used_default_market_data);
        // mean p50 is 50, so the range matches the default-market case
        assert!((rec.rate_range.median - 74.55).abs() < 1e-9);
        assert_eq!(rec.reasoning[0], "Based on market data for python, django");
    }

    #[tokio::test]
    async fn test_failing_market_falls_back_to_defaults() {
        let rec = service(BrokenMarket)
            .get_optimal_rate(&sample_job(), &sample_freelancer(), RateStrategy::Balanced)
            .await
            .unwrap();
        assert!(rec.used_default_market_data);
        assert!((rec.rate_range.median - 74.55).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_market_times_out_to_defaults() {
        let rec = service(SlowMarket)
            .get_optimal_rate(&sample_job(), &sample_freelancer(), RateStrategy::Balanced)
            .await
            .unwrap();
        assert!(rec.used_default_market_data);
    }

    #[tokio::test]
    async fn test_stale_snapshot_still_used_malformed_skipped() {
        let mut stale = snapshot("python", 80.0);
        stale.last_updated = Utc::now() - ChronoDuration::days(90);
        let mut malformed = snapshot("django", 40.0);
        malformed.percentile_25 = 500.0;
        let service = service(InMemoryMarketDataProvider::from_snapshots(vec![stale, malformed]));

        let market = service
            .resolve_market_rates(&sample_job().skills_required, ExperienceLevel::Senior)
            .await;
        assert!(!market.used_default);
        assert_eq!(market.snapshots.len(), 1);
        assert_eq!(market.median(), 80.0);
    }

    #[tokio::test]
    async fn test_duplicate_skills_are_looked_up_once() {
        let service = service(InMemoryMarketDataProvider::from_snapshots(vec![snapshot("python", 60.0)]));
        let skills = vec!["python".to_string(), " Python ".to_string(), String::new()];
        let market = service.resolve_market_rates(&skills, ExperienceLevel::Mid).await;
        assert_eq!(market.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_no_skills_uses_default_market() {
        let mut job = sample_job();
        job.skills_required.clear();
        let market = empty_market()
            .resolve_market_rates(&job.skills_required, ExperienceLevel::Mid)
            .await;
        assert!(market.used_default);
        assert_eq!(market.snapshots[0].skill, DEFAULT_MARKET_SKILL);
        assert_eq!(market.median(), 50.0);
    }

    #[tokio::test]
    async fn test_analyze_below_market() {
        let analysis = empty_market()
            .analyze_rate(30.0, &sample_job(), &sample_freelancer())
            .await;
        assert_eq!(analysis.market_position.position, MarketPosition::Below);
        assert_eq!(analysis.market_position.percentile, 25);
        assert_eq!(analysis.win_probability, MAX_WIN_PROBABILITY);
        assert!((analysis.expected_value - 25.5).abs() < 1e-9);
        assert!((analysis.competitive_analysis.rate_vs_market - 0.6).abs() < 1e-9);
        assert_eq!(
            analysis.recommendations,
            vec!["Your rate is below market - you could charge more".to_string()]
        );
    }

    #[tokio::test]
    async fn test_analyze_far_above_market() {
        let analysis = empty_market()
            .analyze_rate(150.0, &sample_job(), &sample_freelancer())
            .await;
        assert_eq!(analysis.market_position.position, MarketPosition::Above);
        assert_eq!(analysis.market_position.percentile, 95);
        assert!((analysis.win_probability - 0.4925).abs() < 1e-9);
        let rvb = analysis.competitive_analysis.rate_vs_budget.unwrap();
        assert!((rvb - 150.0 / 55.0).abs() < 1e-9);
        assert!(analysis
            .recommendations
            .contains(&"Rate is above market - ensure proposal shows premium value".to_string()));
    }

    #[tokio::test]
    async fn test_analyze_crowded_stale_posting_suggests_lowering() {
        let mut job = sample_job();
        job.competition_level = CompetitionLevel::High;
        job.days_since_posted = 30;
        let analysis = empty_market()
            .analyze_rate(150.0, &job, &sample_freelancer())
            .await;
        assert!((analysis.win_probability - 0.2425).abs() < 1e-9);
        assert_eq!(analysis.recommendations[0], "Consider lowering rate to improve chances");
    }

    #[tokio::test]
    async fn test_analyze_without_budget_has_no_budget_ratio() {
        let mut job = sample_job();
        job.budget_min = None;
        job.budget_max = None;
        let analysis = empty_market()
            .analyze_rate(60.0, &job, &sample_freelancer())
            .await;
        assert_eq!(analysis.competitive_analysis.rate_vs_budget, None);
    }

    #[tokio::test]
    async fn test_target_search_converges_on_first_midpoint() {
        let search = empty_market()
            .find_rate_for_target_win_probability(&sample_job(), &sample_freelancer(), 0.5)
            .await;
        assert!(search.converged);
        assert_eq!(search.iterations, 1);
        assert_eq!(search.rate, 110.0);
        assert!((search.predicted_win_probability - 0.4925).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_target_search_unreachable_returns_best_effort() {
        let search = empty_market()
            .find_rate_for_target_win_probability(&sample_job(), &sample_freelancer(), 0.99)
            .await;
        assert!(!search.converged);
        assert_eq!(search.iterations, TARGET_SEARCH_ITERATIONS);
        assert!(search.rate >= TARGET_SEARCH_LOW && search.rate < 21.0);
    }

    #[tokio::test]
    async fn test_get_market_rate_passes_through() {
        let service = service(InMemoryMarketDataProvider::from_snapshots(vec![snapshot("rust", 95.0)]));
        let found = service
            .get_market_rate("Rust", ExperienceLevel::Senior, None)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.percentile_50), Some(95.0));
        assert!(service
            .get_market_rate("cobol", ExperienceLevel::Senior, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_market_rate_times_out() {
        let result = service(SlowMarket)
            .get_market_rate("rust", ExperienceLevel::Senior, None)
            .await;
        assert!(matches!(result, Err(MarketDataError::Timeout(2000))));
    }
}
