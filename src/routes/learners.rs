use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::irt::ability::theta_to_level;
use crate::response::{ok, AppError};
use crate::services::ability::{LearnerInput, ResponseInput};
use crate::services::learning_path::{PathOptions, PathResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upsert_learner))
        .route("/:id", get(get_learner))
        .route("/:id/responses", post(record_response))
        .route("/:id/next-item", get(next_item))
        .route("/:id/path", post(generate_path))
        .route("/:id/path/regenerate", post(regenerate_path))
        .route("/:id/path/needs-initial", get(needs_initial_path))
        .route("/:id/path/completion", post(path_completion))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LearnerView {
    #[serde(flatten)]
    learner: crate::irt::types::Learner,
    level: crate::irt::ability::ProficiencyLevel,
}

#[derive(Debug, Deserialize)]
struct NextItemQuery {
    skill: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    module_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionResponse {
    updated: bool,
    path: Option<PathResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NeedsInitialResponse {
    needs_initial_path: bool,
}

async fn upsert_learner(
    State(state): State<AppState>,
    Json(payload): Json<LearnerInput>,
) -> Result<impl IntoResponse, AppError> {
    let learner = state.ability().upsert_learner(payload).await?;
    let level = theta_to_level(learner.theta);
    Ok((StatusCode::CREATED, ok(LearnerView { learner, level })))
}

async fn get_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let learner = state.ability().get_learner(&id).await?;
    let level = theta_to_level(learner.theta);
    Ok(ok(LearnerView { learner, level }))
}

async fn record_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ResponseInput>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.ability().record_response(&id, payload).await?))
}

async fn next_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<NextItemQuery>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.ability().next_item(&id, query.skill.as_deref()).await?;
    match item {
        Some(item) => Ok(ok(item)),
        None => Err(AppError::not_found("No items available")),
    }
}

async fn generate_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<PathOptions>>,
) -> Result<impl IntoResponse, AppError> {
    let options = payload.map(|Json(options)| options).unwrap_or_default();
    Ok(ok(state.paths().generate_initial_path(&id, options).await?))
}

async fn regenerate_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.paths().regenerate_path(&id).await?))
}

async fn needs_initial_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let needs_initial_path = state.paths().needs_initial_path(&id).await?;
    Ok(ok(NeedsInitialResponse { needs_initial_path }))
}

async fn path_completion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<CompletionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let path = state
        .paths()
        .update_path_on_completion(&id, request.module_id.as_deref())
        .await?;
    Ok(ok(CompletionResponse {
        updated: path.is_some(),
        path,
    }))
}
