//! Human-readable explanations attached to recommendations and analyses.
//! Each line stands on its own; order is market → profile → budget → competition → outcome.

use crate::models::freelancer::FreelancerProfile;
use crate::models::job::{CompetitionLevel, JobContext};

use super::position::{MarketPosition, MarketStanding};

const EXPERIENCE_NOTE_YEARS: u32 = 5;
const RATING_NOTE_THRESHOLD: f64 = 4.5;
const LOW_WIN_PROBABILITY: f64 = 0.3;

#[derive(Clone, Copy)]
pub struct RecommendationFacts<'a> {
    pub job: &'a JobContext,
    pub freelancer: &'a FreelancerProfile,
    pub rate: f64,
    pub win_probability: f64,
    pub used_default_market_data: bool,
}

pub fn recommendation_reasoning(facts: &RecommendationFacts<'_>) -> Vec<String> {
    let RecommendationFacts {
        job,
        freelancer,
        rate,
        win_probability,
        used_default_market_data,
    } = *facts;
    let mut lines = Vec::new();

    if used_default_market_data || job.skills_required.is_empty() {
        lines.push("No market data for these skills; based on platform-wide default rates".to_string());
    } else {
        let skills: Vec<&str> = job.skills_required.iter().take(3).map(String::as_str).collect();
        lines.push(format!("Based on market data for {}", skills.join(", ")));
    }

    if freelancer.experience_years > EXPERIENCE_NOTE_YEARS {
        lines.push(format!(
            "Adjusted up for your {} years experience",
            freelancer.experience_years
        ));
    }

    if freelancer.rating >= RATING_NOTE_THRESHOLD {
        lines.push(format!("Your {:.1} rating commands a premium", freelancer.rating));
    }

    if let Some(budget_max) = job.known_budget_max() {
        if rate <= budget_max {
            lines.push(format!("Positioned within client's budget (${budget_max:.0}/hr)"));
        } else {
            lines.push("Above stated budget - justify with premium value".to_string());
        }
    }

    match job.competition_level {
        CompetitionLevel::High => lines.push("Competitive rate due to high competition".to_string()),
        CompetitionLevel::Low => {
            lines.push("Low competition leaves room for a higher rate".to_string())
        }
        CompetitionLevel::Medium => {}
    }

    if job.is_repeat_client() {
        lines.push("Repeat client: priced with a relationship premium".to_string());
    }

    lines.push(format!(
        "Expected {:.0}% chance of winning at this rate",
        win_probability * 100.0
    ));

    lines
}

pub fn analysis_recommendations(win_probability: f64, standing: &MarketStanding) -> Vec<String> {
    let mut recs = Vec::new();

    if win_probability < LOW_WIN_PROBABILITY {
        recs.push("Consider lowering rate to improve chances".to_string());
    }
    if standing.position == MarketPosition::Below {
        recs.push("Your rate is below market - you could charge more".to_string());
    }
    if standing.position == MarketPosition::Above && win_probability < 0.5 {
        recs.push("Rate is above market - ensure proposal shows premium value".to_string());
    }
    if recs.is_empty() {
        recs.push("Rate is well positioned for this job".to_string());
    }

    recs
}
