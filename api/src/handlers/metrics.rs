use axum::extract::State;

use crate::state::AppState;

/// Prometheus exposition endpoint
#[tracing::instrument(skip(state))]
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
