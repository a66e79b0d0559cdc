//! Service-to-service authentication for the `/ai/*` routes.
//!
//! Callers send the shared secret in `X-Service-Token` and identify themselves
//! with `X-Calling-Service`. With no token configured every request passes,
//! which is only meant for local development.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";
pub const CALLING_SERVICE_HEADER: &str = "x-calling-service";

/// Wire up with `axum::middleware::from_fn_with_state(state, require_service_token)`.
pub async fn require_service_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = request
        .headers()
        .get(CALLING_SERVICE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Some(expected) = state.config.service_token.as_deref() else {
        warn!(
            "ML_SERVICE_TOKEN not set; allowing {} {} from {caller} without authentication",
            request.method(),
            request.uri().path()
        );
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(SERVICE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Rejected request from {caller}: missing service token");
            AppError::Forbidden("Missing service token".to_string())
        })?;

    if !tokens_match(expected, provided) {
        warn!("Rejected request from {caller}: invalid service token");
        return Err(AppError::Forbidden("Invalid service token".to_string()));
    }

    debug!("Authenticated call from {caller} to {}", request.uri().path());
    Ok(next.run(request).await)
}

fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
