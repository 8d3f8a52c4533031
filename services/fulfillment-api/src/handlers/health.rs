//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;

use crate::state::AppState;

/// GET /health - liveness probe
pub async fn health() -> &'static str {
    "OK"
}

/// GET /ready - readiness probe (checks database connectivity)
pub async fn ready(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    match milkway_db::pool::ping(&state.pool).await {
        Ok(()) => Ok("READY"),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
