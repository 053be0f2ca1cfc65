use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::InteractionLogConfig;
use crate::db::operations::interactions::{self, InteractionFilter, InteractionStats};
use crate::db::{now_ms, DatabaseProxy};
use crate::irt::types::{InteractionSample, InteractionType};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const CRITICAL_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error("cannot anonymize learner id: {0}")]
    Anonymization(String),
    #[error("retention of {0} days is out of range")]
    RetentionOutOfRange(i64),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// An interaction as reported by the application, before anonymization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub learner_id: String,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub learner_level: Option<f64>,
    #[serde(default)]
    pub learner_role: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_difficulty: Option<f64>,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub module_level: Option<i32>,
    #[serde(default)]
    pub module_skill: Option<String>,
    #[serde(default)]
    pub time_spent_ms: Option<i64>,
    #[serde(default)]
    pub session_duration_ms: Option<i64>,
    #[serde(default)]
    pub element_clicked: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub previous_page: Option<String>,
    #[serde(default)]
    pub consecutive_correct: i64,
    #[serde(default)]
    pub consecutive_incorrect: i64,
    #[serde(default)]
    pub session_items_answered: i64,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl InteractionEvent {
    pub fn new(learner_id: impl Into<String>, interaction_type: InteractionType) -> Self {
        Self {
            learner_id: learner_id.into(),
            interaction_type,
            learner_level: None,
            learner_role: None,
            item_id: None,
            item_difficulty: None,
            correct: None,
            response_time_ms: None,
            module_id: None,
            module_level: None,
            module_skill: None,
            time_spent_ms: None,
            session_duration_ms: None,
            element_clicked: None,
            page_url: None,
            previous_page: None,
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            session_items_answered: 0,
            metadata: None,
            timestamp: None,
        }
    }

    pub fn answer(
        learner_id: impl Into<String>,
        item_id: impl Into<String>,
        item_difficulty: f64,
        correct: bool,
        response_time_ms: Option<i64>,
    ) -> Self {
        Self {
            item_id: Some(item_id.into()),
            item_difficulty: Some(item_difficulty),
            correct: Some(correct),
            response_time_ms,
            ..Self::new(learner_id, InteractionType::Answer)
        }
    }

    pub fn module(
        learner_id: impl Into<String>,
        interaction_type: InteractionType,
        module_id: impl Into<String>,
        module_level: i32,
        module_skill: impl Into<String>,
        time_spent_ms: Option<i64>,
    ) -> Self {
        Self {
            module_id: Some(module_id.into()),
            module_level: Some(module_level),
            module_skill: Some(module_skill.into()),
            time_spent_ms,
            ..Self::new(learner_id, interaction_type)
        }
    }

    pub fn page_view(
        learner_id: impl Into<String>,
        page_url: impl Into<String>,
        previous_page: Option<String>,
        time_spent_ms: Option<i64>,
    ) -> Self {
        Self {
            page_url: Some(page_url.into()),
            previous_page,
            time_spent_ms,
            ..Self::new(learner_id, InteractionType::PageView)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePage {
    pub samples: Vec<InteractionSample>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBatch {
    pub batch_number: i64,
    pub batch_size: i64,
    pub count: usize,
    pub has_more: bool,
    pub samples: Vec<InteractionSample>,
}

/// Append-only, anonymized record of learner interactions.
#[derive(Clone)]
pub struct InteractionLog {
    db: Arc<DatabaseProxy>,
    config: InteractionLogConfig,
}

impl InteractionLog {
    pub fn new(db: Arc<DatabaseProxy>, config: InteractionLogConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &InteractionLogConfig {
        &self.config
    }

    /// Deterministic SHA-256 of salt and learner id, hex encoded.
    pub fn anonymize_learner_id(&self, learner_id: &str) -> Result<String, InteractionError> {
        let trimmed = learner_id.trim();
        if trimmed.is_empty() {
            return Err(InteractionError::Anonymization("learner id is empty".to_string()));
        }

        let mut hasher = Sha256::new();
        hasher.update(self.config.anonymization_salt.as_bytes());
        hasher.update(trimmed.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn prepare(&self, event: InteractionEvent) -> Result<InteractionSample, InteractionError> {
        let anonymized_learner_id = self.anonymize_learner_id(&event.learner_id)?;

        Ok(InteractionSample {
            id: Uuid::new_v4().to_string(),
            anonymized_learner_id,
            learner_level: event.learner_level,
            learner_role: event.learner_role,
            interaction_type: event.interaction_type,
            item_id: event.item_id,
            item_difficulty: event.item_difficulty,
            correct: event.correct,
            response_time_ms: event.response_time_ms,
            module_id: event.module_id,
            module_level: event.module_level,
            module_skill: event.module_skill,
            time_spent_ms: event.time_spent_ms,
            session_duration_ms: event.session_duration_ms,
            element_clicked: event.element_clicked,
            page_url: event.page_url,
            previous_page: event.previous_page,
            consecutive_correct: event.consecutive_correct,
            consecutive_incorrect: event.consecutive_incorrect,
            session_items_answered: event.session_items_answered,
            metadata: event.metadata,
            timestamp: event.timestamp.unwrap_or_else(now_ms),
        })
    }

    /// Awaits the write. Used by tests and batch tooling.
    pub async fn record(&self, event: InteractionEvent) -> Result<InteractionSample, InteractionError> {
        let sample = self.prepare(event)?;
        interactions::insert_sample(self.db.pool(), &sample).await?;
        Ok(sample)
    }

    /// Hashes synchronously, then writes in the background. Storage failures
    /// are logged and never reach the caller; answers get one delayed retry.
    pub fn record_detached(&self, event: InteractionEvent) -> Result<String, InteractionError> {
        let sample = self.prepare(event)?;
        let id = sample.id.clone();
        let db = Arc::clone(&self.db);

        tokio::spawn(async move {
            let first = interactions::insert_sample(db.pool(), &sample).await;
            let Err(err) = first else { return };

            if !sample.interaction_type.is_critical() {
                tracing::warn!(
                    error = %err,
                    interaction_type = sample.interaction_type.as_str(),
                    "interaction log write failed"
                );
                return;
            }

            tokio::time::sleep(CRITICAL_RETRY_DELAY).await;
            if let Err(err) = interactions::insert_sample(db.pool(), &sample).await {
                tracing::error!(
                    error = %err,
                    sample_id = %sample.id,
                    "answer interaction dropped after retry"
                );
            }
        });

        Ok(id)
    }

    pub async fn stats(&self) -> Result<InteractionStats, InteractionError> {
        Ok(interactions::stats(self.db.pool()).await?)
    }

    pub async fn query(
        &self,
        filter: &InteractionFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<SamplePage, InteractionError> {
        let limit = limit.unwrap_or(100).clamp(1, self.config.max_page_size);
        let offset = offset.unwrap_or(0).max(0);
        let total = interactions::count_samples(self.db.pool(), filter).await?;
        let samples = interactions::query_samples(self.db.pool(), filter, limit, offset).await?;
        Ok(SamplePage { samples, total, limit, offset })
    }

    pub async fn export_batch(
        &self,
        batch_number: i64,
        batch_size: Option<i64>,
    ) -> Result<ExportBatch, InteractionError> {
        let batch_number = batch_number.max(0);
        let batch_size = batch_size.unwrap_or(self.config.export_batch_size).max(1);
        let samples = interactions::export_batch(self.db.pool(), batch_number, batch_size).await?;
        Ok(ExportBatch {
            batch_number,
            batch_size,
            count: samples.len(),
            has_more: samples.len() as i64 == batch_size,
            samples,
        })
    }

    /// Most recent answers first.
    pub async fn fetch_answer_batch(
        &self,
        limit: i64,
        since_ms: Option<i64>,
    ) -> Result<Vec<InteractionSample>, InteractionError> {
        Ok(interactions::fetch_answer_batch(self.db.pool(), limit.max(1), since_ms).await?)
    }

    pub async fn purge_older_than_days(&self, days: i64) -> Result<u64, InteractionError> {
        let cutoff = days
            .max(0)
            .checked_mul(DAY_MS)
            .and_then(|window| now_ms().checked_sub(window))
            .ok_or(InteractionError::RetentionOutOfRange(days))?;
        let deleted = interactions::delete_older_than(self.db.pool(), cutoff).await?;
        tracing::info!(deleted, retention_days = days, "interaction log purged");
        Ok(deleted)
    }

    pub async fn purge_expired(&self) -> Result<u64, InteractionError> {
        self.purge_older_than_days(self.config.retention_days).await
    }
}
