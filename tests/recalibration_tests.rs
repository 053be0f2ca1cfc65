mod common;

use adaptive_engine::config::Config;
use adaptive_engine::db::operations::catalog;
use adaptive_engine::irt::types::ModelStatus;
use adaptive_engine::services::recalibration::{RetrainOptions, RetrainOutcome};
use adaptive_engine::state::AppState;

use common::{answers, item, test_state, test_state_with};

/// Four learners answer item `x` perfectly and one gets 15 of 20 right:
/// 95 correct out of 100 at a logged difficulty of 0.0.
async fn seed_easy_item(state: &AppState) {
    adaptive_engine::services::catalog::upsert_items(state.db(), &[item("x", 0.0, "reading")])
        .await
        .unwrap();

    let mut events = Vec::new();
    for learner in ["l1", "l2", "l3", "l4"] {
        events.extend(answers(learner, "x", 0.0, 20, 20));
    }
    events.extend(answers("l5", "x", 0.0, 15, 20));

    for event in events {
        state.interactions().record(event).await.unwrap();
    }
}

#[tokio::test]
async fn test_easy_item_is_made_harder_and_deployed() {
    let state = test_state().await;
    seed_easy_item(&state).await;

    let engine = state.engine();
    let outcome = engine.retrain_model(RetrainOptions::default()).await;
    let RetrainOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run, got {outcome:?}");
    };

    assert_eq!(summary.version, "v1");
    assert_eq!(summary.training_data_count, 100);
    assert!((summary.metrics.accuracy - 0.95).abs() < 1e-9);
    assert!(summary.deployed);
    assert!(summary.deploy_error.is_none());

    let x = catalog::get_item(state.db().pool(), "x").await.unwrap().unwrap();
    assert!((x.difficulty - 0.2).abs() < 1e-9);

    let production = engine.registry().current_production().await.unwrap().unwrap();
    assert_eq!(production.id, summary.version_id);
    assert_eq!(production.status, ModelStatus::Deployed);
    assert!(production.is_production);
    assert_eq!(engine.registry().snapshot().version_tag().as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_second_deploy_archives_the_first() {
    let state = test_state().await;
    seed_easy_item(&state).await;
    let engine = state.engine();

    let RetrainOutcome::Completed(first) = engine.retrain_model(RetrainOptions::default()).await else {
        panic!("first run failed");
    };
    let RetrainOutcome::Completed(second) = engine.retrain_model(RetrainOptions::default()).await else {
        panic!("second run failed");
    };
    assert_eq!(second.version, "v2");
    assert!(second.deployed);

    let registry = engine.registry();
    assert_eq!(registry.production_count().await.unwrap(), 1);
    let first = registry.get(&first.version_id).await.unwrap().unwrap();
    assert_eq!(first.status, ModelStatus::Archived);
    assert!(!first.is_production);
}

#[tokio::test]
async fn test_empty_batch_leaves_production_untouched() {
    let state = test_state().await;
    seed_easy_item(&state).await;
    let engine = state.engine();

    let RetrainOutcome::Completed(deployed) = engine.retrain_model(RetrainOptions::default()).await else {
        panic!("seed run failed");
    };

    let options = RetrainOptions {
        since: Some(i64::MAX / 2),
        ..RetrainOptions::default()
    };
    let outcome = engine.retrain_model(options).await;
    match outcome {
        RetrainOutcome::Failed { message, version } => {
            assert_eq!(message, "No training data available");
            assert!(version.is_none());
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let registry = engine.registry();
    assert_eq!(registry.list(50).await.unwrap().len(), 1);
    let production = registry.current_production().await.unwrap().unwrap();
    assert_eq!(production.id, deployed.version_id);
    assert!(!engine.status().is_training);
}

#[tokio::test]
async fn test_concurrent_retrain_is_rejected() {
    let state = test_state().await;
    seed_easy_item(&state).await;
    let engine = state.engine();

    let (a, b) = tokio::join!(
        engine.retrain_model(RetrainOptions::default()),
        engine.retrain_model(RetrainOptions::default())
    );

    let outcomes = [a, b];
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, RetrainOutcome::Completed(_)))
        .count();
    let rejected: Vec<&String> = outcomes
        .iter()
        .filter_map(|o| match o {
            RetrainOutcome::Rejected { message } => Some(message),
            _ => None,
        })
        .collect();

    assert_eq!(completed, 1);
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].contains("already in progress"));
    assert!(!engine.status().is_training);
}

#[tokio::test]
async fn test_below_threshold_waits_for_manual_promotion() {
    let mut config = Config::default();
    config.recalibration.deploy_threshold = 0.99;
    let state = test_state_with(config).await;
    seed_easy_item(&state).await;
    let engine = state.engine();

    let RetrainOutcome::Completed(summary) = engine.retrain_model(RetrainOptions::default()).await else {
        panic!("run failed");
    };
    assert!(!summary.deployed);

    let registry = engine.registry();
    let version = registry.get(&summary.version_id).await.unwrap().unwrap();
    assert_eq!(version.status, ModelStatus::Completed);
    assert!(registry.current_production().await.unwrap().is_none());

    let promoted = engine.promote(&summary.version_id).await.unwrap();
    assert_eq!(promoted.status, ModelStatus::Deployed);

    // Manual promotion moves the pointer only.
    let x = catalog::get_item(state.db().pool(), "x").await.unwrap().unwrap();
    assert_eq!(x.difficulty, 0.0);
}

#[tokio::test]
async fn test_auto_deploy_can_be_disabled_per_run() {
    let state = test_state().await;
    seed_easy_item(&state).await;
    let engine = state.engine();

    let options = RetrainOptions {
        auto_deploy: Some(false),
        ..RetrainOptions::default()
    };
    let RetrainOutcome::Completed(summary) = engine.retrain_model(options).await else {
        panic!("run failed");
    };
    assert!(!summary.deployed);
    assert!(engine.registry().snapshot().get().is_none());
}

#[tokio::test]
async fn test_store_failure_after_create_marks_version_failed() {
    let state = test_state().await;
    seed_easy_item(&state).await;
    let engine = state.engine();

    let RetrainOutcome::Completed(deployed) = engine.retrain_model(RetrainOptions::default()).await else {
        panic!("seed run failed");
    };

    sqlx::query(
        r#"
        CREATE TRIGGER "reject_completion" BEFORE UPDATE ON "model_versions"
        WHEN OLD."status" = 'training' AND NEW."status" = 'completed'
        BEGIN SELECT RAISE(ABORT, 'disk full'); END
        "#,
    )
    .execute(state.db().pool())
    .await
    .unwrap();

    let outcome = engine.retrain_model(RetrainOptions::default()).await;
    let RetrainOutcome::Failed { message, version } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("disk full"));
    assert_eq!(version.as_deref(), Some("v2"));
    assert!(!engine.status().is_training);

    let registry = engine.registry();
    let versions = registry.list(10).await.unwrap();
    let failed = versions.iter().find(|v| v.version == "v2").unwrap();
    assert_eq!(failed.status, ModelStatus::Failed);
    assert!(!failed.is_production);
    assert_eq!(failed.errors.len(), 1);

    let production = registry.current_production().await.unwrap().unwrap();
    assert_eq!(production.id, deployed.version_id);
    assert_eq!(registry.snapshot().version_tag().as_deref(), Some("v1"));
}
