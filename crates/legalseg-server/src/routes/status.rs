//! Service health route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// GET /api/status — health and store counts.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "legalseg",
        "users": state.store.count_users().unwrap_or(0),
        "cases": state.store.count_cases().unwrap_or(0),
        "predictions": state.store.count_predictions().unwrap_or(0),
    }))
}
