use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use crate::irt::types::Learner;

fn map_learner(row: &SqliteRow) -> Result<Learner, sqlx::Error> {
    Ok(Learner {
        id: row.try_get("id")?,
        theta: row.try_get("theta")?,
        role: row.try_get("role")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

/// Inserts the learner or updates whichever of `theta`/`role` is supplied.
pub async fn upsert_learner<'e, E>(
    executor: E,
    id: &str,
    theta: Option<f64>,
    role: Option<&str>,
    now_ms: i64,
) -> Result<Learner, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO "learners" ("id", "theta", "role", "createdAt", "updatedAt")
        VALUES (?1, COALESCE(?2, 0.0), COALESCE(?3, 'student'), ?4, ?4)
        ON CONFLICT ("id") DO UPDATE SET
            "theta" = COALESCE(?2, "learners"."theta"),
            "role" = COALESCE(?3, "learners"."role"),
            "updatedAt" = ?4
        RETURNING "id", "theta", "role", "createdAt", "updatedAt"
        "#,
    )
    .bind(id)
    .bind(theta)
    .bind(role)
    .bind(now_ms)
    .fetch_one(executor)
    .await?;

    map_learner(&row)
}

pub async fn get_learner<'e, E>(executor: E, id: &str) -> Result<Option<Learner>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"SELECT "id", "theta", "role", "createdAt", "updatedAt" FROM "learners" WHERE "id" = ?1"#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(map_learner).transpose()
}

pub async fn update_theta<'e, E>(
    executor: E,
    id: &str,
    theta: f64,
    now_ms: i64,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(r#"UPDATE "learners" SET "theta" = ?2, "updatedAt" = ?3 WHERE "id" = ?1"#)
        .bind(id)
        .bind(theta)
        .bind(now_ms)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Bumps `updatedAt` as the first write of a transaction so SQLite hands the
/// write lock to this connection before theta is read.
pub async fn touch_learner<'e, E>(executor: E, id: &str, now_ms: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(r#"UPDATE "learners" SET "updatedAt" = ?2 WHERE "id" = ?1"#)
        .bind(id)
        .bind(now_ms)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
