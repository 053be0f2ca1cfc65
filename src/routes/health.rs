use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_latency_ms: Option<u64>,
    production_model: Option<String>,
    recalibrating: bool,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    started_at: String,
}

async fn root(State(state): State<AppState>) -> Response {
    let ping = state.db().ping().await;
    if let Err(err) = &ping {
        tracing::warn!(error = %err, "health check: database unreachable");
    }
    let ok = ping.is_ok();
    let engine = state.engine();

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: if ok { "connected" } else { "disconnected" },
        db_latency_ms: ping.ok().map(|d| d.as_millis() as u64),
        production_model: engine.registry().snapshot().version_tag(),
        recalibrating: engine.status().is_training,
        timestamp: now_iso(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    let started_at: DateTime<Utc> = state.started_at_system().into();
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
    .into_response()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
