use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::response::{ok, AppError};
use crate::services::interaction_log::InteractionEvent;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(ingest))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accepted {
    id: String,
}

/// Accepted once the learner id is hashed; the write itself happens later.
async fn ingest(
    State(state): State<AppState>,
    Json(event): Json<InteractionEvent>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.interactions().record_detached(event)?;
    Ok((StatusCode::ACCEPTED, ok(Accepted { id })))
}
