use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidOutcome {
    Won,
    Lost,
    Withdrawn,
}

impl BidOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidOutcome::Won => "won",
            BidOutcome::Lost => "lost",
            BidOutcome::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for BidOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "won" => Ok(BidOutcome::Won),
            "lost" => Ok(BidOutcome::Lost),
            "withdrawn" => Ok(BidOutcome::Withdrawn),
            other => Err(format!(
                "unknown outcome '{other}'; expected won, lost, or withdrawn"
            )),
        }
    }
}

/// One bid result, kept for future model training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOutcomeRecord {
    pub id: Uuid,
    pub job_id: String,
    pub freelancer_id: String,
    pub proposed_rate: f64,
    pub outcome: BidOutcome,
    pub final_rate: Option<f64>,
    pub client_feedback: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
