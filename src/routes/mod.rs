mod admin;
mod catalog;
mod health;
mod interactions;
mod learners;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api/learners", learners::router())
        .nest("/api/interactions", interactions::router())
        .nest("/api/catalog", catalog::router())
        .nest("/api/admin", admin::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found").into_response()
}
