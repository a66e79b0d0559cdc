use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::outcomes::OutcomeSink;
use crate::rate::optimizer::RateOptimizerService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Built once at startup with the configured win model and market source.
    pub optimizer: Arc<RateOptimizerService>,
    pub outcomes: Arc<dyn OutcomeSink>,
    pub started_at: Instant,
}
