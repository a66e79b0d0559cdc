use serde::{Deserialize, Serialize};

/// How crowded the job posting is. Unknown values are treated as `Medium` upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompetitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionLevel::Low => "low",
            CompetitionLevel::Medium => "medium",
            CompetitionLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientHistory {
    #[serde(default)]
    pub previous_contracts: u32,
}

/// The job a freelancer is bidding on. Immutable per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContext {
    pub job_id: String,
    #[serde(default, alias = "job_title")]
    pub title: String,
    #[serde(default, alias = "job_skills")]
    pub skills_required: Vec<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub duration: Option<String>,
    #[serde(default)]
    pub competition_level: CompetitionLevel,
    #[serde(default)]
    pub client_history: ClientHistory,
    #[serde(default)]
    pub days_since_posted: u32,
}

impl JobContext {
    /// Budget bounds that carry information. Zero or negative bounds are ignored.
    pub fn known_budget_min(&self) -> Option<f64> {
        self.budget_min.filter(|v| *v > 0.0)
    }

    pub fn known_budget_max(&self) -> Option<f64> {
        self.budget_max.filter(|v| *v > 0.0)
    }

    /// Midpoint of whichever budget bounds are known. `None` when the client
    /// stated no budget at all.
    pub fn budget_midpoint(&self) -> Option<f64> {
        match (self.known_budget_min(), self.known_budget_max()) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }

    pub fn is_repeat_client(&self) -> bool {
        self.client_history.previous_contracts > 0
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("budget_min", self.budget_min), ("budget_max", self.budget_max)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{name} cannot be negative"));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.known_budget_min(), self.known_budget_max()) {
            if lo > hi {
                return Err(format!("budget_min ({lo}) exceeds budget_max ({hi})"));
            }
        }
        Ok(())
    }
}
