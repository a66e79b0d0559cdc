pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::require_service_token;
use crate::rate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Rate API, behind the service token
    let rate_api = Router::new()
        .route("/ai/rate/optimize", post(handlers::handle_optimize))
        .route("/ai/rate/analyze", post(handlers::handle_analyze))
        .route("/ai/rate/market/:skill", get(handlers::handle_market_rate))
        .route("/ai/rate/target", post(handlers::handle_target_rate))
        .route("/ai/rate/feedback", post(handlers::handle_feedback))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_service_token,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/live", get(health::live_handler))
        .merge(rate_api)
        .with_state(state)
}
