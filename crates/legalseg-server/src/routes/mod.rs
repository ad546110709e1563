//! HTTP route handlers.

pub mod analyze;
pub mod status;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::state::AppState;
use legalseg_core::Error;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(analyze::routes())
}

/// Maps domain errors onto the HTTP error contract: a status code and a
/// `{ "message": ..., "error"? }` JSON body. The raw remote-service text is
/// echoed only on 502, for diagnostics.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_)
            | Error::UnsupportedFormat(_)
            | Error::EmptyContent
            | Error::Extraction(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RemoteService(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (message, detail) = match &self.0 {
            Error::RemoteService(raw) => (
                "Inference service reported an error".to_string(),
                Some(raw.clone()),
            ),
            // The underlying library error goes to the log, not the caller.
            Error::Extraction(_) => ("Could not read the uploaded document".to_string(), None),
            Error::Storage(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Config(_)
            | Error::Internal(_) => ("Internal server error".to_string(), None),
            other => (other.to_string(), None),
        };

        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }

        let mut body = serde_json::json!({ "message": message });
        if let Some(detail) = detail {
            body["error"] = serde_json::Value::String(detail);
        }
        (status, Json(body)).into_response()
    }
}
