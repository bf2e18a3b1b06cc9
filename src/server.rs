//! Inbound HTTP trigger.
//!
//! `POST /run` schedules one background run per email and answers
//! immediately; the sender of the request never sees the run's result.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::flow::EmailFlow;
use crate::pipeline::types::EmailInput;

#[derive(Clone)]
struct AppState {
    flow: Arc<EmailFlow>,
}

/// Build the trigger and health routes.
pub fn routes(flow: Arc<EmailFlow>) -> Router {
    Router::new()
        .route("/run", post(run_email))
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(AppState { flow })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /run
async fn run_email(
    State(state): State<AppState>,
    Json(email): Json<EmailInput>,
) -> impl IntoResponse {
    info!(message_id = %email.message_id, "Email received; scheduling run");
    let message_id = email.message_id.clone();

    let flow = Arc::clone(&state.flow);
    tokio::spawn(async move {
        let outcome = flow.run(email).await;
        info!(
            message_id = %outcome.message_id,
            action = ?outcome.action,
            delivered = outcome.delivered,
            "Run finished"
        );
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": format!("Processing started for {message_id}")
        })),
    )
}
