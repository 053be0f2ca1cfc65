use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite};

use super::{decode_json, encode_json};
use crate::irt::types::{InteractionSample, InteractionType};

const SAMPLE_COLUMNS: &str = r#""id", "anonymizedLearnerId", "learnerLevel", "learnerRole",
    "interactionType", "itemId", "itemDifficulty", "correct", "responseTimeMs",
    "moduleId", "moduleLevel", "moduleSkill", "timeSpentMs", "sessionDurationMs",
    "elementClicked", "pageUrl", "previousPage", "consecutiveCorrect",
    "consecutiveIncorrect", "sessionItemsAnswered", "metadata", "timestamp""#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFilter {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub interaction_type: Option<InteractionType>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub earliest: Option<i64>,
    pub latest: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionStats {
    pub total_records: i64,
    pub unique_anonymized_learners: i64,
    pub interaction_type_counts: BTreeMap<String, i64>,
    pub date_range: DateRange,
}

fn map_sample(row: &SqliteRow) -> Result<InteractionSample, sqlx::Error> {
    let kind: String = row.try_get("interactionType")?;
    let interaction_type = InteractionType::parse(&kind).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "interactionType".to_string(),
        source: format!("unknown interaction type: {kind}").into(),
    })?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(InteractionSample {
        id: row.try_get("id")?,
        anonymized_learner_id: row.try_get("anonymizedLearnerId")?,
        learner_level: row.try_get("learnerLevel")?,
        learner_role: row.try_get("learnerRole")?,
        interaction_type,
        item_id: row.try_get("itemId")?,
        item_difficulty: row.try_get("itemDifficulty")?,
        correct: row.try_get("correct")?,
        response_time_ms: row.try_get("responseTimeMs")?,
        module_id: row.try_get("moduleId")?,
        module_level: row.try_get("moduleLevel")?,
        module_skill: row.try_get("moduleSkill")?,
        time_spent_ms: row.try_get("timeSpentMs")?,
        session_duration_ms: row.try_get("sessionDurationMs")?,
        element_clicked: row.try_get("elementClicked")?,
        page_url: row.try_get("pageUrl")?,
        previous_page: row.try_get("previousPage")?,
        consecutive_correct: row.try_get("consecutiveCorrect")?,
        consecutive_incorrect: row.try_get("consecutiveIncorrect")?,
        session_items_answered: row.try_get("sessionItemsAnswered")?,
        metadata: metadata
            .as_deref()
            .map(|raw| decode_json("metadata", raw))
            .transpose()?,
        timestamp: row.try_get("timestamp")?,
    })
}

pub async fn insert_sample<'e, E>(executor: E, sample: &InteractionSample) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let metadata = sample.metadata.as_ref().map(encode_json).transpose()?;
    let sql = format!(
        r#"INSERT INTO "interaction_log" ({SAMPLE_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"#
    );

    sqlx::query(&sql)
        .bind(&sample.id)
        .bind(&sample.anonymized_learner_id)
        .bind(sample.learner_level)
        .bind(sample.learner_role.as_deref())
        .bind(sample.interaction_type.as_str())
        .bind(sample.item_id.as_deref())
        .bind(sample.item_difficulty)
        .bind(sample.correct)
        .bind(sample.response_time_ms)
        .bind(sample.module_id.as_deref())
        .bind(sample.module_level)
        .bind(sample.module_skill.as_deref())
        .bind(sample.time_spent_ms)
        .bind(sample.session_duration_ms)
        .bind(sample.element_clicked.as_deref())
        .bind(sample.page_url.as_deref())
        .bind(sample.previous_page.as_deref())
        .bind(sample.consecutive_correct)
        .bind(sample.consecutive_incorrect)
        .bind(sample.session_items_answered)
        .bind(metadata)
        .bind(sample.timestamp)
        .execute(executor)
        .await?;
    Ok(())
}

/// Most recent answer samples first, bounded by `limit`.
pub async fn fetch_answer_batch<'e, E>(
    executor: E,
    limit: i64,
    since_ms: Option<i64>,
) -> Result<Vec<InteractionSample>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {SAMPLE_COLUMNS} FROM "interaction_log"
        WHERE "interactionType" = 'answer' AND (?1 IS NULL OR "timestamp" >= ?1)
        ORDER BY "timestamp" DESC, "rowid" DESC
        LIMIT ?2"#
    );
    let rows = sqlx::query(&sql)
        .bind(since_ms)
        .bind(limit)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_sample).collect()
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &InteractionFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(start) = filter.start_ms {
        builder.push(r#" AND "timestamp" >= "#).push_bind(start);
    }
    if let Some(end) = filter.end_ms {
        builder.push(r#" AND "timestamp" <= "#).push_bind(end);
    }
    if let Some(kind) = filter.interaction_type {
        builder.push(r#" AND "interactionType" = "#).push_bind(kind.as_str());
    }
}

/// Newest first.
pub async fn query_samples<'e, E>(
    executor: E,
    filter: &InteractionFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<InteractionSample>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        r#"SELECT {SAMPLE_COLUMNS} FROM "interaction_log""#
    ));
    push_filter(&mut builder, filter);
    builder
        .push(r#" ORDER BY "timestamp" DESC, "rowid" DESC LIMIT "#)
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter().map(map_sample).collect()
}

pub async fn count_samples<'e, E>(executor: E, filter: &InteractionFilter) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(r#"SELECT COUNT(*) AS "count" FROM "interaction_log""#);
    push_filter(&mut builder, filter);
    let row = builder.build().fetch_one(executor).await?;
    row.try_get("count")
}

/// Oldest first so consecutive batches never overlap as new rows arrive.
pub async fn export_batch<'e, E>(
    executor: E,
    batch_number: i64,
    batch_size: i64,
) -> Result<Vec<InteractionSample>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {SAMPLE_COLUMNS} FROM "interaction_log"
        ORDER BY "timestamp" ASC, "rowid" ASC
        LIMIT ?1 OFFSET ?2"#
    );
    let rows = sqlx::query(&sql)
        .bind(batch_size)
        .bind(batch_number.saturating_mul(batch_size))
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_sample).collect()
}

pub async fn stats<'e, E>(executor: E) -> Result<InteractionStats, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite> + Copy,
{
    let totals = sqlx::query(
        r#"
        SELECT COUNT(*) AS "total",
               COUNT(DISTINCT "anonymizedLearnerId") AS "learners",
               MIN("timestamp") AS "earliest",
               MAX("timestamp") AS "latest"
        FROM "interaction_log"
        "#,
    )
    .fetch_one(executor)
    .await?;

    let type_rows = sqlx::query(
        r#"SELECT "interactionType", COUNT(*) AS "count" FROM "interaction_log" GROUP BY "interactionType""#,
    )
    .fetch_all(executor)
    .await?;

    let mut interaction_type_counts: BTreeMap<String, i64> = BTreeMap::new();
    for row in &type_rows {
        interaction_type_counts.insert(row.try_get("interactionType")?, row.try_get("count")?);
    }

    Ok(InteractionStats {
        total_records: totals.try_get("total")?,
        unique_anonymized_learners: totals.try_get("learners")?,
        interaction_type_counts,
        date_range: DateRange {
            earliest: totals.try_get("earliest")?,
            latest: totals.try_get("latest")?,
        },
    })
}

pub async fn delete_older_than<'e, E>(executor: E, cutoff_ms: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(r#"DELETE FROM "interaction_log" WHERE "timestamp" < ?1"#)
        .bind(cutoff_ms)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
