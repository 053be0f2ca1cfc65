mod common;

use axum::http::StatusCode;
use adaptive_engine::services::interaction_log::InteractionEvent;
use serde_json::json;

use common::{create_test_app, send};

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["recalibrating"], false);
    assert!(body["productionModel"].is_null());
}

#[tokio::test]
async fn test_health_live_endpoint() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(&app, "GET", "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(&app, "GET", "/api/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_learner_upsert_then_get() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/learners",
        Some(json!({ "id": "learner-1", "theta": 0.5, "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], "learner-1");
    assert_eq!(body["data"]["theta"], 0.5);

    let (status, body) = send(&app, "GET", "/api/learners/learner-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "student");
}

#[tokio::test]
async fn test_missing_learner_is_404() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(&app, "GET", "/api/learners/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, "POST", "/api/learners/ghost/path", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_path_without_catalog_is_service_unavailable() {
    let (app, _) = create_test_app().await;
    send(&app, "POST", "/api/learners", Some(json!({ "id": "learner-2" }))).await;

    let (status, body) = send(&app, "POST", "/api/learners/learner-2/path", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CATALOG_NOT_INITIALIZED");
}

#[tokio::test]
async fn test_response_moves_theta_and_clears_needs_initial() {
    let (app, _) = create_test_app().await;
    send(&app, "POST", "/api/learners", Some(json!({ "id": "learner-3", "theta": 0.0 }))).await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/catalog/items",
        Some(json!([{ "id": "q1", "difficulty": 0.0, "skill": "reading" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/learners/learner-3/path/needs-initial", None).await;
    assert_eq!(body["data"]["needsInitialPath"], true);

    let (status, body) = send(
        &app,
        "POST",
        "/api/learners/learner-3/responses",
        Some(json!({ "itemId": "q1", "correct": true, "responseTimeMs": 2000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["previousTheta"], 0.0);
    assert!(body["data"]["theta"].as_f64().unwrap() > 0.0);
    assert_eq!(body["data"]["expectedProbability"], 0.5);

    let (_, body) = send(&app, "GET", "/api/learners/learner-3/path/needs-initial", None).await;
    assert_eq!(body["data"]["needsInitialPath"], false);
}

#[tokio::test]
async fn test_response_for_unknown_item_is_404() {
    let (app, _) = create_test_app().await;
    send(&app, "POST", "/api/learners", Some(json!({ "id": "learner-4" }))).await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/learners/learner-4/responses",
        Some(json!({ "itemId": "missing", "correct": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_next_item_prefers_closest_difficulty() {
    let (app, _) = create_test_app().await;
    send(&app, "POST", "/api/learners", Some(json!({ "id": "learner-5", "theta": 1.0 }))).await;
    send(
        &app,
        "PUT",
        "/api/catalog/items",
        Some(json!([
            { "id": "easy", "difficulty": -2.0, "skill": "reading" },
            { "id": "match", "difficulty": 0.9, "skill": "reading" },
            { "id": "hard", "difficulty": 2.5, "skill": "reading" }
        ])),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/learners/learner-5/next-item?skill=reading", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "match");
}

#[tokio::test]
async fn test_interaction_ingest_accepts_and_rejects() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/interactions",
        Some(json!({ "learnerId": "learner-6", "interactionType": "page_view", "pageUrl": "/home" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["data"]["id"].as_str().is_some());

    let (status, body) = send(
        &app,
        "POST",
        "/api/interactions",
        Some(json!({ "learnerId": "   ", "interactionType": "click" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_interaction_storage_failure_stays_off_the_request_path() {
    let (app, state) = create_test_app().await;
    send(&app, "POST", "/api/learners", Some(json!({ "id": "learner-7", "theta": 0.0 }))).await;
    send(
        &app,
        "PUT",
        "/api/catalog/items",
        Some(json!([{ "id": "q1", "difficulty": 0.0, "skill": "reading" }])),
    )
    .await;
    sqlx::query(r#"DROP TABLE "interaction_log""#)
        .execute(state.db().pool())
        .await
        .unwrap();

    let id = state
        .interactions()
        .record_detached(InteractionEvent::answer("learner-7", "q1", 0.0, true, None));
    assert!(id.is_ok());

    let (status, _) = send(
        &app,
        "POST",
        "/api/interactions",
        Some(json!({ "learnerId": "learner-7", "interactionType": "click" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/learners/learner-7/responses",
        Some(json!({ "itemId": "q1", "correct": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let theta = body["data"]["theta"].as_f64().unwrap();
    assert!(theta > 0.0);

    let stored = state.ability().get_learner("learner-7").await.unwrap();
    assert_eq!(stored.theta, theta);
}

#[tokio::test]
async fn test_invalid_catalog_item_is_rejected() {
    let (app, _) = create_test_app().await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/catalog/items",
        Some(json!([{ "id": "bad", "difficulty": 0.0, "discrimination": 0.0, "skill": "reading" }])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/catalog/items", None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_retrain_without_data_reports_failure() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(&app, "POST", "/api/admin/mlops/retrain", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No training data available");

    let (_, body) = send(&app, "GET", "/api/admin/mlops/versions", None).await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = send(&app, "GET", "/api/admin/mlops/versions/production", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_mlops_status_when_idle() {
    let (app, _) = create_test_app().await;
    let (status, body) = send(&app, "GET", "/api/admin/mlops/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isTraining"], false);
    assert!(body["data"]["productionVersion"].is_null());
}

#[tokio::test]
async fn test_training_data_rejects_unknown_type() {
    let (app, _) = create_test_app().await;
    let (status, _) = send(&app, "GET", "/api/admin/mlops/training-data?interactionType=scroll", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/admin/mlops/training-data/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalRecords"], 0);
}

#[tokio::test]
async fn test_retention_rejects_non_positive_days() {
    let (app, _) = create_test_app().await;
    let (status, _) = send(&app, "DELETE", "/api/admin/mlops/training-data/retention?days=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "DELETE", "/api/admin/mlops/training-data/retention?days=30", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 0);
}

#[tokio::test]
async fn test_retention_rejects_days_beyond_clock_range() {
    let (app, state) = create_test_app().await;
    state
        .interactions()
        .record(InteractionEvent::answer("l1", "q1", 0.0, true, None))
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        "DELETE",
        "/api/admin/mlops/training-data/retention?days=200000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(state.interactions().stats().await.unwrap().total_records, 1);
}

#[tokio::test]
async fn test_promoting_unknown_version_is_404() {
    let (app, _) = create_test_app().await;
    let (status, _) = send(&app, "POST", "/api/admin/mlops/versions/nope/promote", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
