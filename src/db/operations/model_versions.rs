use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use super::{decode_json, encode_json};
use crate::irt::types::{EvaluationMetrics, ModelParameters, ModelStatus, ModelVersion, RunError};

const VERSION_COLUMNS: &str = r#""id", "version", "versionNumber", "modelType", "trainingDataCount",
    "trainingStartedAt", "trainingCompletedAt", "parameters", "metrics", "status",
    "isProduction", "deployedAt", "trainedBy", "config", "errors", "createdAt""#;

fn map_version(row: &SqliteRow) -> Result<ModelVersion, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = ModelStatus::parse(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: format!("unknown model status: {status}").into(),
    })?;
    let parameters: Option<String> = row.try_get("parameters")?;
    let metrics: Option<String> = row.try_get("metrics")?;
    let config: String = row.try_get("config")?;
    let errors: String = row.try_get("errors")?;

    Ok(ModelVersion {
        id: row.try_get("id")?,
        version: row.try_get("version")?,
        version_number: row.try_get("versionNumber")?,
        model_type: row.try_get("modelType")?,
        training_data_count: row.try_get("trainingDataCount")?,
        training_started_at: row.try_get("trainingStartedAt")?,
        training_completed_at: row.try_get("trainingCompletedAt")?,
        parameters: parameters
            .as_deref()
            .map(|raw| decode_json("parameters", raw))
            .transpose()?,
        metrics: metrics
            .as_deref()
            .map(|raw| decode_json("metrics", raw))
            .transpose()?,
        status,
        is_production: row.try_get("isProduction")?,
        deployed_at: row.try_get("deployedAt")?,
        trained_by: row.try_get("trainedBy")?,
        config: decode_json("config", &config)?,
        errors: decode_json("errors", &errors)?,
        created_at: row.try_get("createdAt")?,
    })
}

pub async fn next_version_number<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"SELECT COALESCE(MAX("versionNumber"), 0) + 1 AS "next" FROM "model_versions""#,
    )
    .fetch_one(executor)
    .await?;
    row.try_get("next")
}

pub async fn insert_version<'e, E>(executor: E, version: &ModelVersion) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let parameters = version.parameters.as_ref().map(encode_json).transpose()?;
    let metrics = version.metrics.as_ref().map(encode_json).transpose()?;
    let config = encode_json(&version.config)?;
    let errors = encode_json(&version.errors)?;
    let sql = format!(
        r#"INSERT INTO "model_versions" ({VERSION_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"#
    );

    sqlx::query(&sql)
        .bind(&version.id)
        .bind(&version.version)
        .bind(version.version_number)
        .bind(&version.model_type)
        .bind(version.training_data_count)
        .bind(version.training_started_at)
        .bind(version.training_completed_at)
        .bind(parameters)
        .bind(metrics)
        .bind(version.status.as_str())
        .bind(version.is_production)
        .bind(version.deployed_at)
        .bind(&version.trained_by)
        .bind(config)
        .bind(errors)
        .bind(version.created_at)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn get_version<'e, E>(executor: E, id: &str) -> Result<Option<ModelVersion>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {VERSION_COLUMNS} FROM "model_versions" WHERE "id" = ?1"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(map_version).transpose()
}

/// Newest first.
pub async fn list_versions<'e, E>(executor: E, limit: i64) -> Result<Vec<ModelVersion>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {VERSION_COLUMNS} FROM "model_versions" ORDER BY "versionNumber" DESC LIMIT ?1"#
    );
    let rows = sqlx::query(&sql).bind(limit).fetch_all(executor).await?;
    rows.iter().map(map_version).collect()
}

pub async fn get_production<'e, E>(executor: E) -> Result<Option<ModelVersion>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {VERSION_COLUMNS} FROM "model_versions" WHERE "isProduction" = 1"#);
    let row = sqlx::query(&sql).fetch_optional(executor).await?;
    row.as_ref().map(map_version).transpose()
}

pub async fn count_production<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(r#"SELECT COUNT(*) AS "count" FROM "model_versions" WHERE "isProduction" = 1"#)
        .fetch_one(executor)
        .await?;
    row.try_get("count")
}

/// Only a version still in `training` can complete.
pub async fn mark_completed<'e, E>(
    executor: E,
    id: &str,
    parameters: &ModelParameters,
    metrics: &EvaluationMetrics,
    completed_at: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE "model_versions"
        SET "status" = 'completed', "parameters" = ?2, "metrics" = ?3, "trainingCompletedAt" = ?4
        WHERE "id" = ?1 AND "status" = 'training'
        "#,
    )
    .bind(id)
    .bind(encode_json(parameters)?)
    .bind(encode_json(metrics)?)
    .bind(completed_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_failed<'e, E>(executor: E, id: &str, error: &RunError) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE "model_versions"
        SET "status" = 'failed',
            "trainingCompletedAt" = ?2,
            "errors" = json_insert("errors", '$[#]', json(?3))
        WHERE "id" = ?1 AND "status" = 'training'
        "#,
    )
    .bind(id)
    .bind(error.timestamp)
    .bind(encode_json(error)?)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn archive_production<'e, E>(executor: E, except_id: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE "model_versions"
        SET "status" = 'archived', "isProduction" = 0
        WHERE "isProduction" = 1 AND "id" <> ?1
        "#,
    )
    .bind(except_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Conditional on the target being promotable; returns whether it moved.
pub async fn mark_deployed<'e, E>(executor: E, id: &str, deployed_at: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE "model_versions"
        SET "status" = 'deployed', "isProduction" = 1, "deployedAt" = ?2
        WHERE "id" = ?1 AND "status" IN ('completed', 'deployed')
        "#,
    )
    .bind(id)
    .bind(deployed_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
