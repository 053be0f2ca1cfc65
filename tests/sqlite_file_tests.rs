use adaptive_engine::config::{Config, InteractionLogConfig};
use adaptive_engine::db::config::DbConfig;
use adaptive_engine::db::operations::{catalog, learners};
use adaptive_engine::db::schema::SCHEMA_VERSION;
use adaptive_engine::db::DatabaseProxy;
use adaptive_engine::irt::ability::update_theta;
use adaptive_engine::irt::types::Item;
use adaptive_engine::services::ability::{LearnerInput, ResponseInput};
use adaptive_engine::services::interaction_log::{InteractionEvent, InteractionLog};
use adaptive_engine::state::AppState;
use sqlx::Row;
use tempfile::TempDir;

#[tokio::test]
async fn test_creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("engine.db");

    let db = DatabaseProxy::connect(DbConfig::for_path(&path)).await.unwrap();
    assert!(path.exists());
    assert!(db.ping().await.is_ok());
}

#[tokio::test]
async fn test_data_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.db");

    {
        let db = DatabaseProxy::connect(DbConfig::for_path(&path)).await.unwrap();
        learners::upsert_learner(db.pool(), "persisted", Some(1.25), Some("student"), 1_000)
            .await
            .unwrap();
        let item = Item {
            id: "q1".to_string(),
            difficulty: -0.5,
            discrimination: 1.2,
            skill: "listening".to_string(),
        };
        catalog::upsert_item(db.pool(), &item, 1_000).await.unwrap();
        db.pool().close().await;
    }

    let db = DatabaseProxy::connect(DbConfig::for_path(&path)).await.unwrap();
    let learner = learners::get_learner(db.pool(), "persisted").await.unwrap().unwrap();
    assert_eq!(learner.theta, 1.25);
    assert_eq!(learner.role, "student");

    let item = catalog::get_item(db.pool(), "q1").await.unwrap().unwrap();
    assert_eq!(item.skill, "listening");
    assert_eq!(item.discrimination, 1.2);
}

#[tokio::test]
async fn test_migrations_are_idempotent_and_versioned() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.db");

    let first = DatabaseProxy::connect(DbConfig::for_path(&path)).await.unwrap();
    first.pool().close().await;
    let db = DatabaseProxy::connect(DbConfig::for_path(&path)).await.unwrap();

    let row = sqlx::query(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
        .fetch_one(db.pool())
        .await
        .unwrap();
    let version: String = row.try_get("value").unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_interaction_log_on_disk_stores_only_hashed_ids() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseProxy::connect(DbConfig::for_path(&dir.path().join("engine.db")))
        .await
        .unwrap();
    let log = InteractionLog::new(
        db.clone(),
        InteractionLogConfig {
            anonymization_salt: "pepper".to_string(),
            ..InteractionLogConfig::default()
        },
    );

    log.record(InteractionEvent::answer("alice@example.com", "q1", 0.0, true, None))
        .await
        .unwrap();

    let raw: Vec<String> = sqlx::query(r#"SELECT "anonymizedLearnerId" FROM "interaction_log""#)
        .fetch_all(db.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| row.try_get("anonymizedLearnerId").unwrap())
        .collect();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].len(), 64);
    assert!(!raw[0].contains("alice"));
    assert_eq!(raw[0], log.anonymize_learner_id("alice@example.com").unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_responses_each_move_theta() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseProxy::connect(DbConfig::for_path(&dir.path().join("engine.db")))
        .await
        .unwrap();
    let item = Item {
        id: "q".to_string(),
        difficulty: 0.0,
        discrimination: 1.0,
        skill: "reading".to_string(),
    };
    catalog::upsert_item(db.pool(), &item, 1_000).await.unwrap();
    let state = AppState::new(Config::default(), db);
    state
        .ability()
        .upsert_learner(LearnerInput {
            id: "l".to_string(),
            theta: Some(0.0),
            role: None,
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .ability()
                    .record_response(
                        "l",
                        ResponseInput {
                            item_id: "q".to_string(),
                            correct: true,
                            response_time_ms: None,
                            session_started_at: None,
                        },
                    )
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let expected = (0..20).fold(0.0, |theta, _| update_theta(theta, 0.0, 1.0, true));
    let stored = state.ability().get_learner("l").await.unwrap();
    assert!((stored.theta - expected).abs() < 1e-9, "stored {} expected {}", stored.theta, expected);
}
