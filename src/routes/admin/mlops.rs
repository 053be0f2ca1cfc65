use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::db::operations::interactions::InteractionFilter;
use crate::irt::types::InteractionType;
use crate::response::{ok, AppError};
use crate::services::recalibration::{RetrainOptions, RetrainOutcome, RetrainReport, RetrainStatus};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/retrain", post(retrain))
        .route("/status", get(status))
        .route("/training-data", get(training_data))
        .route("/training-data/stats", get(training_data_stats))
        .route("/training-data/export", get(export_training_data))
        .route("/training-data/retention", delete(purge_training_data))
        .route("/versions", get(list_versions))
        .route("/versions/production", get(production_version))
        .route("/versions/:id/promote", post(promote_version))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainingDataQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    interaction_type: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    batch_number: Option<i64>,
    batch_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RetentionQuery {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(flatten)]
    run: RetrainStatus,
    production_version: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeResponse {
    deleted: u64,
    retention_days: i64,
}

async fn retrain(
    State(state): State<AppState>,
    payload: Option<Json<RetrainOptions>>,
) -> impl IntoResponse {
    let options = payload.map(|Json(options)| options).unwrap_or_default();
    let outcome = state.engine().retrain_model(options).await;

    let status = match &outcome {
        RetrainOutcome::Completed(_) => StatusCode::OK,
        RetrainOutcome::Rejected { .. } => StatusCode::CONFLICT,
        RetrainOutcome::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(RetrainReport::from(outcome)))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine();
    ok(StatusResponse {
        run: engine.status(),
        production_version: engine.registry().snapshot().version_tag(),
    })
}

async fn training_data_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.interactions().stats().await?))
}

async fn training_data(
    State(state): State<AppState>,
    Query(query): Query<TrainingDataQuery>,
) -> Result<impl IntoResponse, AppError> {
    let interaction_type = query
        .interaction_type
        .as_deref()
        .map(|raw| {
            InteractionType::parse(raw)
                .ok_or_else(|| AppError::validation(format!("unknown interaction type: {raw}")))
        })
        .transpose()?;

    let filter = InteractionFilter {
        start_ms: query.start_date.as_deref().map(parse_timestamp).transpose()?,
        end_ms: query.end_date.as_deref().map(parse_timestamp).transpose()?,
        interaction_type,
    };

    let page = state
        .interactions()
        .query(&filter, query.limit, query.offset)
        .await?;
    Ok(ok(page))
}

async fn export_training_data(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let batch = state
        .interactions()
        .export_batch(query.batch_number.unwrap_or(0), query.batch_size)
        .await?;
    Ok(ok(batch))
}

async fn purge_training_data(
    State(state): State<AppState>,
    Query(query): Query<RetentionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let retention_days = query
        .days
        .unwrap_or(state.config().interactions.retention_days);
    if retention_days < 1 {
        return Err(AppError::validation("days must be at least 1"));
    }
    let deleted = state
        .interactions()
        .purge_older_than_days(retention_days)
        .await?;
    Ok(ok(PurgeResponse {
        deleted,
        retention_days,
    }))
}

async fn list_versions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let engine = state.engine();
    Ok(ok(engine.registry().list(query.limit.unwrap_or(50)).await?))
}

async fn production_version(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let engine = state.engine();
    Ok(ok(engine.registry().current_production().await?))
}

async fn promote_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().promote(&id).await?))
}

/// Accepts epoch milliseconds or RFC 3339.
fn parse_timestamp(raw: &str) -> Result<i64, AppError> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| AppError::validation(format!("invalid date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1700000000000").ok(), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp("1970-01-01T00:00:01Z").ok(), Some(1_000));
        assert!(parse_timestamp("yesterday").is_err());
    }
}
