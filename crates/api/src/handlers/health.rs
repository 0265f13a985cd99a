//! Health check endpoints for load balancers and monitoring.
//!
//! `/` is pure liveness. `/ready` returns 200 OK only when the database and
//! the expiring store are reachable, 503 Service Unavailable otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/ready", get(readiness))
}

async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    database: bool,
    store: bool,
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.database)
        .await
        .is_ok();

    let store_ok = state.store.ping().await.unwrap_or(false);

    let healthy = db_ok && store_ok;

    let response = ReadinessResponse {
        status: if healthy { "ok" } else { "unhealthy" },
        database: db_ok,
        store: store_ok,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
