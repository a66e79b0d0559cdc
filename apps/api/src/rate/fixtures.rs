//! Shared request fixtures for the rate engine tests.

use chrono::Utc;

use crate::models::freelancer::FreelancerProfile;
use crate::models::job::{ClientHistory, CompetitionLevel, JobContext};
use crate::models::market::{ExperienceLevel, MarketRateSnapshot, RateTrend};

pub fn sample_freelancer() -> FreelancerProfile {
    FreelancerProfile {
        user_id: "freelancer-42".to_string(),
        skills: vec![
            "python".to_string(),
            "django".to_string(),
            "javascript".to_string(),
        ],
        experience_years: 5,
        rating: 4.7,
        completion_rate: 0.96,
        historical_win_rate: 0.35,
        average_rate: 55.0,
    }
}

/// Budget 30–80 (midpoint 55), medium competition, first-time client.
pub fn sample_job() -> JobContext {
    JobContext {
        job_id: "job-123".to_string(),
        title: "Build a Django REST API".to_string(),
        skills_required: vec!["python".to_string(), "django".to_string()],
        budget_min: Some(30.0),
        budget_max: Some(80.0),
        duration: Some("1-3 months".to_string()),
        competition_level: CompetitionLevel::Medium,
        client_history: ClientHistory::default(),
        days_since_posted: 0,
    }
}

/// Snapshot with p25/p75/p90 spread proportionally around `p50`.
pub fn snapshot(skill: &str, p50: f64) -> MarketRateSnapshot {
    MarketRateSnapshot {
        skill: skill.to_string(),
        experience_level: ExperienceLevel::Senior,
        percentile_25: p50 * 0.7,
        percentile_50: p50,
        percentile_75: p50 * 1.5,
        percentile_90: p50 * 2.0,
        sample_size: 500,
        trend: RateTrend::Stable,
        last_updated: Utc::now(),
    }
}
