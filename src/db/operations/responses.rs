use sqlx::{Executor, Row, Sqlite};

use crate::irt::types::ResponseEvent;

pub async fn insert_response<'e, E>(executor: E, event: &ResponseEvent) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO "responses" ("id", "learnerId", "itemId", "correct", "timestamp")
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&event.id)
    .bind(&event.learner_id)
    .bind(&event.item_id)
    .bind(event.correct)
    .bind(event.timestamp)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn has_responses<'e, E>(executor: E, learner_id: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"SELECT EXISTS(SELECT 1 FROM "responses" WHERE "learnerId" = ?1) AS "found""#,
    )
    .bind(learner_id)
    .fetch_one(executor)
    .await?;
    row.try_get("found")
}

/// Outcomes since `since_ms`, paired with the answered item's skill when the
/// item is still in the catalog.
pub async fn skill_outcomes_since<'e, E>(
    executor: E,
    learner_id: &str,
    since_ms: i64,
) -> Result<Vec<(Option<String>, bool)>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT i."skill" AS "skill", r."correct" AS "correct"
        FROM "responses" r
        LEFT JOIN "items" i ON i."id" = r."itemId"
        WHERE r."learnerId" = ?1 AND r."timestamp" >= ?2
        ORDER BY r."timestamp" DESC
        "#,
    )
    .bind(learner_id)
    .bind(since_ms)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| -> Result<(Option<String>, bool), sqlx::Error> {
            Ok((row.try_get("skill")?, row.try_get("correct")?))
        })
        .collect()
}

pub async fn distinct_items_answered<'e, E>(executor: E, learner_id: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"SELECT COUNT(DISTINCT "itemId") AS "count" FROM "responses" WHERE "learnerId" = ?1"#,
    )
    .bind(learner_id)
    .fetch_one(executor)
    .await?;
    row.try_get("count")
}

/// Newest first.
pub async fn recent_outcomes<'e, E>(
    executor: E,
    learner_id: &str,
    limit: i64,
) -> Result<Vec<bool>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT "correct" FROM "responses"
        WHERE "learnerId" = ?1
        ORDER BY "timestamp" DESC, "rowid" DESC
        LIMIT ?2
        "#,
    )
    .bind(learner_id)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    rows.iter().map(|row| row.try_get("correct")).collect()
}

pub async fn count_since<'e, E>(executor: E, learner_id: &str, since_ms: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS "count" FROM "responses" WHERE "learnerId" = ?1 AND "timestamp" >= ?2"#,
    )
    .bind(learner_id)
    .bind(since_ms)
    .fetch_one(executor)
    .await?;
    row.try_get("count")
}

/// Distinct items from the learner's last `limit` responses.
pub async fn recent_item_ids<'e, E>(executor: E, learner_id: &str, limit: i64) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT "itemId" FROM (
            SELECT "itemId" FROM "responses"
            WHERE "learnerId" = ?1
            ORDER BY "timestamp" DESC
            LIMIT ?2
        )
        "#,
    )
    .bind(learner_id)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    rows.iter().map(|row| row.try_get("itemId")).collect()
}
