#![allow(dead_code)]

use std::sync::Arc;

use adaptive_engine::config::Config;
use adaptive_engine::db::DatabaseProxy;
use adaptive_engine::irt::types::{Item, Module, ModuleItem};
use adaptive_engine::services::catalog;
use adaptive_engine::services::interaction_log::InteractionEvent;
use adaptive_engine::state::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

pub async fn test_state() -> AppState {
    test_state_with(Config::default()).await
}

pub async fn test_state_with(config: Config) -> AppState {
    let db = DatabaseProxy::in_memory().await.expect("in-memory database");
    AppState::new(config, db)
}

pub async fn create_test_app() -> (Router, AppState) {
    let state = test_state().await;
    (adaptive_engine::create_app(state.clone()), state)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn item(id: &str, difficulty: f64, skill: &str) -> Item {
    Item {
        id: id.to_string(),
        difficulty,
        discrimination: 1.0,
        skill: skill.to_string(),
    }
}

pub fn module(id: &str, skill: &str, level: i32, difficulties: &[f64]) -> Module {
    Module {
        id: id.to_string(),
        title: format!("{skill} {level}"),
        skill: skill.to_string(),
        level,
        items: difficulties
            .iter()
            .map(|&difficulty| ModuleItem {
                item_id: None,
                title: None,
                difficulty,
                discrimination: 1.0,
            })
            .collect(),
    }
}

pub async fn seed_catalog(db: &Arc<DatabaseProxy>) {
    let modules = vec![
        module("reading-intro", "reading", 0, &[-2.5, -2.0]),
        module("reading-core", "reading", 2, &[0.0, 0.2]),
        module("writing-intro", "writing", 0, &[-2.2]),
        module("writing-core", "writing", 2, &[0.1]),
        module("listening-core", "listening", 2, &[0.0]),
        module("speaking-core", "speaking", 2, &[0.3]),
    ];
    catalog::upsert_modules(db, &modules).await.expect("seed modules");
}

/// `correct` answers out of `total` on `item_id` from one learner.
pub fn answers(learner: &str, item_id: &str, difficulty: f64, correct: usize, total: usize) -> Vec<InteractionEvent> {
    (0..total)
        .map(|i| InteractionEvent::answer(learner, item_id, difficulty, i < correct, Some(1_500)))
        .collect()
}
