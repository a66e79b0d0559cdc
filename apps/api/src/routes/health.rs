use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Service version plus the collaborator backends chosen at startup.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "ratewise",
        "win_model": state.optimizer.model_backend(),
        "market_data": state.optimizer.market_backend(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /ready
pub async fn ready_handler() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}

/// GET /live
pub async fn live_handler() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}
