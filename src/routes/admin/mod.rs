use axum::Router;

use crate::state::AppState;

mod mlops;

pub fn router() -> Router<AppState> {
    Router::new().nest("/mlops", mlops::router())
}
