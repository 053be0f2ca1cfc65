use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;

use crate::irt::types::{Item, Module};
use crate::response::{ok, AppError};
use crate::services::catalog;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", put(upsert_items).get(list_items))
        .route("/modules", put(upsert_modules).get(list_modules))
}

#[derive(Serialize)]
struct Upserted {
    upserted: usize,
}

async fn upsert_items(
    State(state): State<AppState>,
    Json(items): Json<Vec<Item>>,
) -> Result<impl IntoResponse, AppError> {
    let upserted = catalog::upsert_items(state.db(), &items).await?;
    Ok(ok(Upserted { upserted }))
}

async fn list_items(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(catalog::list_items(state.db()).await?))
}

async fn upsert_modules(
    State(state): State<AppState>,
    Json(modules): Json<Vec<Module>>,
) -> Result<impl IntoResponse, AppError> {
    let upserted = catalog::upsert_modules(state.db(), &modules).await?;
    Ok(ok(Upserted { upserted }))
}

async fn list_modules(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(catalog::list_modules(state.db()).await?))
}
