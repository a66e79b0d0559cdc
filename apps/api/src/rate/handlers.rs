use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::freelancer::FreelancerProfile;
use crate::models::job::JobContext;
use crate::models::market::{ExperienceLevel, MarketRateSnapshot};
use crate::models::outcome::{BidOutcome, RateOutcomeRecord};
use crate::rate::optimizer::{RateAnalysis, RateRecommendation, TargetRateSearch};
use crate::rate::position::MarketStanding;
use crate::rate::strategy::{AlternativeStrategy, RateStrategy};
use crate::state::AppState;

/// Money leaves the service rounded to cents; the engine keeps full precision.
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round_probability(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn validated(job: &JobContext, freelancer: &FreelancerProfile) -> Result<(), AppError> {
    job.validate().map_err(AppError::Validation)?;
    freelancer.validate().map_err(AppError::Validation)
}

// ────────────────────────────────────────────────────────────────────────────
// POST /ai/rate/optimize
// ────────────────────────────────────────────────────────────────────────────

/// Job fields sit at the top level (`job_id`, `job_title`, `skills_required`,
/// budgets, ...). `job_description` is accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct OptimizeRateRequest {
    #[serde(flatten)]
    pub job: JobContext,
    pub freelancer_profile: FreelancerProfile,
    pub strategy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateRangeResponse {
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Serialize)]
pub struct AlternativeStrategyResponse {
    pub strategy: RateStrategy,
    pub rate: f64,
    pub win_probability: f64,
    pub description: &'static str,
}

impl From<AlternativeStrategy> for AlternativeStrategyResponse {
    fn from(alt: AlternativeStrategy) -> Self {
        Self {
            strategy: alt.strategy,
            rate: round_cents(alt.rate),
            win_probability: round_probability(alt.win_probability),
            description: alt.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OptimizeRateResponse {
    pub job_id: String,
    pub recommended_rate: f64,
    pub rate_range: RateRangeResponse,
    pub win_probability: f64,
    pub expected_value: f64,
    pub confidence: f64,
    pub strategy: RateStrategy,
    pub reasoning: Vec<String>,
    pub alternative_strategies: Vec<AlternativeStrategyResponse>,
    pub market_position: MarketStanding,
    pub used_default_market_data: bool,
}

impl OptimizeRateResponse {
    fn new(job_id: String, rec: RateRecommendation) -> Self {
        Self {
            job_id,
            recommended_rate: round_cents(rec.recommended_rate),
            rate_range: RateRangeResponse {
                min: round_cents(rec.rate_range.min),
                max: round_cents(rec.rate_range.max),
                median: round_cents(rec.rate_range.median),
            },
            win_probability: round_probability(rec.win_probability),
            expected_value: round_cents(rec.expected_value),
            confidence: rec.confidence,
            strategy: rec.strategy,
            reasoning: rec.reasoning,
            alternative_strategies: rec.alternatives.into_iter().map(Into::into).collect(),
            market_position: rec.market_position,
            used_default_market_data: rec.used_default_market_data,
        }
    }
}

pub async fn handle_optimize(
    State(state): State<AppState>,
    Json(req): Json<OptimizeRateRequest>,
) -> Result<Json<OptimizeRateResponse>, AppError> {
    validated(&req.job, &req.freelancer_profile)?;
    let strategy = match req.strategy.as_deref() {
        Some(raw) => raw
            .parse::<RateStrategy>()
            .map_err(|e| AppError::Validation(e.to_string()))?,
        None => RateStrategy::default(),
    };

    let rec = state
        .optimizer
        .get_optimal_rate(&req.job, &req.freelancer_profile, strategy)
        .await?;

    Ok(Json(OptimizeRateResponse::new(req.job.job_id, rec)))
}

// ────────────────────────────────────────────────────────────────────────────
// POST /ai/rate/analyze
// ────────────────────────────────────────────────────────────────────────────

/// `job_skills` is accepted as an alias of `skills_required`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRateRequest {
    #[serde(flatten)]
    pub job: JobContext,
    pub proposed_rate: f64,
    pub freelancer_profile: FreelancerProfile,
}

#[derive(Debug, Serialize)]
pub struct CompetitiveAnalysisResponse {
    pub market_median: f64,
    pub rate_vs_market: f64,
    pub rate_vs_budget: Option<f64>,
    pub win_rate_at_this_price: f64,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeRateResponse {
    pub job_id: String,
    pub proposed_rate: f64,
    pub win_probability: f64,
    pub expected_value: f64,
    pub market_position: &'static str,
    pub market_percentile: u8,
    pub competitive_analysis: CompetitiveAnalysisResponse,
    pub recommendations: Vec<String>,
    pub used_default_market_data: bool,
}

impl AnalyzeRateResponse {
    fn new(job_id: String, analysis: RateAnalysis) -> Self {
        let ca = analysis.competitive_analysis;
        Self {
            job_id,
            proposed_rate: round_cents(analysis.proposed_rate),
            win_probability: round_probability(analysis.win_probability),
            expected_value: round_cents(analysis.expected_value),
            market_position: analysis.market_position.position.as_str(),
            market_percentile: analysis.market_position.percentile,
            competitive_analysis: CompetitiveAnalysisResponse {
                market_median: round_cents(ca.market_median),
                rate_vs_market: round_probability(ca.rate_vs_market),
                rate_vs_budget: ca.rate_vs_budget.map(round_probability),
                win_rate_at_this_price: round_probability(ca.win_rate_at_this_price),
            },
            recommendations: analysis.recommendations,
            used_default_market_data: analysis.used_default_market_data,
        }
    }
}

pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRateRequest>,
) -> Result<Json<AnalyzeRateResponse>, AppError> {
    if !req.proposed_rate.is_finite() || req.proposed_rate <= 0.0 {
        return Err(AppError::Validation("proposed_rate must be positive".to_string()));
    }
    validated(&req.job, &req.freelancer_profile)?;

    let analysis = state
        .optimizer
        .analyze_rate(req.proposed_rate, &req.job, &req.freelancer_profile)
        .await;

    Ok(Json(AnalyzeRateResponse::new(req.job.job_id, analysis)))
}

// ────────────────────────────────────────────────────────────────────────────
// GET /ai/rate/market/:skill
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MarketRateQuery {
    pub experience_level: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarketRateResponse {
    pub skill: String,
    pub experience_level: ExperienceLevel,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    pub sample_size: u32,
    pub trend: &'static str,
    pub last_updated: String,
    pub is_stale: bool,
}

impl MarketRateResponse {
    fn new(snapshot: MarketRateSnapshot, is_stale: bool) -> Self {
        Self {
            skill: snapshot.skill,
            experience_level: snapshot.experience_level,
            percentile_25: round_cents(snapshot.percentile_25),
            percentile_50: round_cents(snapshot.percentile_50),
            percentile_75: round_cents(snapshot.percentile_75),
            percentile_90: round_cents(snapshot.percentile_90),
            sample_size: snapshot.sample_size,
            trend: snapshot.trend.as_str(),
            last_updated: snapshot.last_updated.to_rfc3339(),
            is_stale,
        }
    }
}

pub async fn handle_market_rate(
    State(state): State<AppState>,
    Path(skill): Path<String>,
    Query(query): Query<MarketRateQuery>,
) -> Result<Json<MarketRateResponse>, AppError> {
    let level = match query.experience_level.as_deref() {
        Some(raw) => raw.parse::<ExperienceLevel>().map_err(AppError::Validation)?,
        None => ExperienceLevel::default(),
    };
    let location = query.location.as_deref().filter(|l| !l.trim().is_empty());

    let snapshot = state
        .optimizer
        .get_market_rate(&skill, level, location)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No market data for skill '{skill}'")))?;

    let is_stale = state.optimizer.is_stale(&snapshot);
    Ok(Json(MarketRateResponse::new(snapshot, is_stale)))
}

// ────────────────────────────────────────────────────────────────────────────
// POST /ai/rate/target
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TargetRateRequest {
    #[serde(flatten)]
    pub job: JobContext,
    pub freelancer_profile: FreelancerProfile,
    pub target_win_probability: f64,
}

#[derive(Debug, Serialize)]
pub struct TargetRateResponse {
    pub job_id: String,
    pub target_win_probability: f64,
    pub rate: f64,
    pub predicted_win_probability: f64,
    pub converged: bool,
    pub iterations: u32,
}

impl TargetRateResponse {
    fn new(job_id: String, target: f64, search: TargetRateSearch) -> Self {
        Self {
            job_id,
            target_win_probability: target,
            rate: round_cents(search.rate),
            predicted_win_probability: round_probability(search.predicted_win_probability),
            converged: search.converged,
            iterations: search.iterations,
        }
    }
}

pub async fn handle_target_rate(
    State(state): State<AppState>,
    Json(req): Json<TargetRateRequest>,
) -> Result<Json<TargetRateResponse>, AppError> {
    let target = req.target_win_probability;
    if !(target > 0.0 && target < 1.0) {
        return Err(AppError::Validation(
            "target_win_probability must be between 0 and 1 (exclusive)".to_string(),
        ));
    }
    validated(&req.job, &req.freelancer_profile)?;

    let search = state
        .optimizer
        .find_rate_for_target_win_probability(&req.job, &req.freelancer_profile, target)
        .await;

    Ok(Json(TargetRateResponse::new(req.job.job_id, target, search)))
}

// ────────────────────────────────────────────────────────────────────────────
// POST /ai/rate/feedback
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RateFeedbackRequest {
    pub job_id: String,
    pub freelancer_id: String,
    pub proposed_rate: f64,
    /// won | lost | withdrawn
    pub outcome: String,
    pub final_rate: Option<f64>,
    pub client_feedback: Option<String>,
}

impl RateFeedbackRequest {
    fn into_record(self) -> Result<RateOutcomeRecord, AppError> {
        let outcome: BidOutcome = self.outcome.parse().map_err(AppError::Validation)?;
        if !self.proposed_rate.is_finite() || self.proposed_rate <= 0.0 {
            return Err(AppError::Validation("proposed_rate must be positive".to_string()));
        }
        if let Some(rate) = self.final_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(AppError::Validation("final_rate cannot be negative".to_string()));
            }
        }
        Ok(RateOutcomeRecord {
            id: Uuid::new_v4(),
            job_id: self.job_id,
            freelancer_id: self.freelancer_id,
            proposed_rate: self.proposed_rate,
            outcome,
            final_rate: self.final_rate,
            client_feedback: self.client_feedback,
            recorded_at: Utc::now(),
        })
    }
}

/// Fire-and-forget: the response does not wait for the sink.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Json(req): Json<RateFeedbackRequest>,
) -> Result<Json<Value>, AppError> {
    let record = req.into_record()?;
    let job_id = record.job_id.clone();
    let sink = state.outcomes.clone();

    tokio::spawn(async move {
        let outcome = record.outcome;
        let job_id = record.job_id.clone();
        match sink.record(record).await {
            Ok(()) => info!(
                event = "rate_optimizer.outcome_recorded",
                job_id = %job_id,
                outcome = outcome.as_str(),
                sink = sink.backend(),
                "Bid outcome recorded"
            ),
            Err(e) => error!("Failed to record outcome for job {job_id}: {e:?}"),
        }
    });

    Ok(Json(json!({ "status": "recorded", "job_id": job_id })))
}
