//! HTTP trigger for the duplication pipeline
//!
//! `GET /` runs the pipeline synchronously and responds with the JSON array
//! of outcomes. A run that cannot happen is answered with a JSON error body:
//! `409 Conflict` while another run is in flight, `500` otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use libdupcast::{DupcastError, Outcome, Runner};
use serde_json::json;

/// State shared with the handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: Runner,
}

/// Build the axum router for the trigger endpoint
pub fn router(runner: Runner) -> Router {
    Router::new()
        .route("/", get(run_duplication))
        .with_state(AppState { runner })
}

async fn run_duplication(State(state): State<AppState>) -> Result<Json<Vec<Outcome>>, ApiError> {
    tracing::info!("Run requested over HTTP");
    state.runner.log().info("Run requested over HTTP").await;

    let outcomes = state.runner.try_run().await?;
    Ok(Json(outcomes))
}

/// A run failure turned into an HTTP response
#[derive(Debug)]
pub struct ApiError(DupcastError);

impl From<DupcastError> for ApiError {
    fn from(error: DupcastError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            DupcastError::RunInProgress => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(status = %status, error = %self.0, "HTTP run failed");

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
