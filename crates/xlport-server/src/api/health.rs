use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    worker: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let worker = state.worker.is_running();
    Json(HealthResponse {
        status: if worker { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        worker,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
