use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{normalize_skill, MarketDataError, MarketDataProvider};
use crate::models::market::{ExperienceLevel, MarketRateSnapshot};

/// Immutable in-process table of snapshots, keyed by normalised skill.
///
/// Used for local development (seeded from a JSON file) and in tests. When a
/// skill has no snapshot for the requested experience level, the first snapshot
/// recorded for that skill is returned.
#[derive(Debug, Default)]
pub struct InMemoryMarketDataProvider {
    snapshots: HashMap<String, Vec<MarketRateSnapshot>>,
}

impl InMemoryMarketDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots(snapshots: impl IntoIterator<Item = MarketRateSnapshot>) -> Self {
        let mut table: HashMap<String, Vec<MarketRateSnapshot>> = HashMap::new();
        for snapshot in snapshots {
            table
                .entry(normalize_skill(&snapshot.skill))
                .or_default()
                .push(snapshot);
        }
        Self { snapshots: table }
    }

    /// Loads a JSON array of `MarketRateSnapshot`.
    pub fn from_seed_file(path: &Path) -> Result<Self, MarketDataError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshots: Vec<MarketRateSnapshot> = serde_json::from_str(&raw)?;
        info!(
            "Loaded {} market rate snapshots from {}",
            snapshots.len(),
            path.display()
        );
        Ok(Self::from_snapshots(snapshots))
    }

    pub fn len(&self) -> usize {
        self.snapshots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryMarketDataProvider {
    async fn get_rate_data(
        &self,
        skill: &str,
        experience_level: ExperienceLevel,
        _location: Option<&str>,
    ) -> Result<Option<MarketRateSnapshot>, MarketDataError> {
        let Some(candidates) = self.snapshots.get(&normalize_skill(skill)) else {
            return Ok(None);
        };
        let found = candidates
            .iter()
            .find(|s| s.experience_level == experience_level)
            .or_else(|| candidates.first());
        Ok(found.cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
