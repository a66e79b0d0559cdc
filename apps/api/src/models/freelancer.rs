use serde::{Deserialize, Serialize};

/// Snapshot of a freelancer supplied with each request. Never mutated by the optimizer.
///
/// Missing numeric fields fall back to platform-typical defaults so a sparse
/// profile still yields a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreelancerProfile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default = "default_experience_years")]
    pub experience_years: u32,
    /// 1.0 – 5.0
    #[serde(default = "default_rating")]
    pub rating: f64,
    /// 0.0 – 1.0
    #[serde(default = "default_completion_rate")]
    pub completion_rate: f64,
    /// 0.0 – 1.0
    #[serde(default = "default_win_rate", alias = "win_rate")]
    pub historical_win_rate: f64,
    /// Hourly rate the freelancer usually bills. 0 when unknown.
    #[serde(default)]
    pub average_rate: f64,
}

fn default_experience_years() -> u32 {
    3
}

fn default_rating() -> f64 {
    4.5
}

fn default_completion_rate() -> f64 {
    0.95
}

fn default_win_rate() -> f64 {
    0.3
}

impl FreelancerProfile {
    /// Checks value ranges. Returns a message suitable for a 400 response.
    pub fn validate(&self) -> Result<(), String> {
        if !(1.0..=5.0).contains(&self.rating) {
            return Err(format!("rating must be between 1 and 5, got {}", self.rating));
        }
        if !(0.0..=1.0).contains(&self.completion_rate) {
            return Err(format!(
                "completion_rate must be between 0 and 1, got {}",
                self.completion_rate
            ));
        }
        if !(0.0..=1.0).contains(&self.historical_win_rate) {
            return Err(format!(
                "historical_win_rate must be between 0 and 1, got {}",
                self.historical_win_rate
            ));
        }
        if !self.average_rate.is_finite() || self.average_rate < 0.0 {
            return Err("average_rate cannot be negative".to_string());
        }
        Ok(())
    }
}
