use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::RecalibrationConfig;
use crate::db::now_ms;
use crate::irt::calibration::{aggregate, calibrate, summarize};
use crate::irt::evaluation::evaluate;
use crate::irt::types::{EvaluationMetrics, ModelVersion, TrainingConfig};
use crate::services::interaction_log::{InteractionError, InteractionLog};
use crate::services::model_registry::{ModelRegistry, RegistryError, VersionDraft};

#[derive(Debug, thiserror::Error)]
pub enum RecalibrationError {
    #[error("Recalibration already in progress")]
    AlreadyInProgress,
    #[error("No training data available")]
    EmptyBatch,
    #[error(transparent)]
    Log(#[from] InteractionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainOptions {
    #[serde(default)]
    pub limit: Option<i64>,
    /// Epoch milliseconds; older samples are ignored.
    #[serde(default)]
    pub since: Option<i64>,
    #[serde(default)]
    pub auto_deploy: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainSummary {
    pub version: String,
    pub version_id: String,
    pub metrics: EvaluationMetrics,
    pub training_data_count: usize,
    pub duration_ms: u64,
    pub deployed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RetrainOutcome {
    Completed(RetrainSummary),
    /// Another run holds the guard; nothing was touched.
    Rejected { message: String },
    Failed { message: String, version: Option<String> },
}

impl RetrainOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainReport {
    pub success: bool,
    #[serde(flatten)]
    pub summary: Option<RetrainSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_version: Option<String>,
}

impl From<RetrainOutcome> for RetrainReport {
    fn from(outcome: RetrainOutcome) -> Self {
        match outcome {
            RetrainOutcome::Completed(summary) => Self {
                success: true,
                summary: Some(summary),
                message: None,
                failed_version: None,
            },
            RetrainOutcome::Rejected { message } => Self {
                success: false,
                summary: None,
                message: Some(message),
                failed_version: None,
            },
            RetrainOutcome::Failed { message, version } => Self {
                success: false,
                summary: None,
                message: Some(message),
                failed_version: version,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainStatus {
    pub is_training: bool,
    pub current_version: Option<String>,
    pub started_at: Option<i64>,
}

#[derive(Debug, Default)]
struct RunState {
    active: bool,
    current_version: Option<String>,
    started_at: Option<i64>,
}

/// Held for the duration of one run; releasing it clears the run state.
pub struct RunGuard<'a> {
    engine: &'a RecalibrationEngine,
}

impl RunGuard<'_> {
    fn set_version(&self, version: &ModelVersion) {
        self.engine.run.lock().current_version = Some(version.version.clone());
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.run.lock();
        state.active = false;
        state.current_version = None;
        state.started_at = None;
    }
}

pub struct RecalibrationEngine {
    log: InteractionLog,
    registry: ModelRegistry,
    config: RecalibrationConfig,
    run: Mutex<RunState>,
}

impl RecalibrationEngine {
    pub fn new(log: InteractionLog, registry: ModelRegistry, config: RecalibrationConfig) -> Self {
        Self {
            log,
            registry,
            config,
            run: Mutex::new(RunState::default()),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Claims the single run slot.
    pub fn start(&self) -> Result<RunGuard<'_>, RecalibrationError> {
        let mut state = self.run.lock();
        if state.active {
            return Err(RecalibrationError::AlreadyInProgress);
        }
        state.active = true;
        state.current_version = None;
        state.started_at = Some(now_ms());
        Ok(RunGuard { engine: self })
    }

    pub fn status(&self) -> RetrainStatus {
        let state = self.run.lock();
        RetrainStatus {
            is_training: state.active,
            current_version: state.current_version.clone(),
            started_at: state.started_at,
        }
    }

    /// Runs one recalibration. Never returns an error: every failure is
    /// folded into the outcome.
    pub async fn retrain_model(&self, options: RetrainOptions) -> RetrainOutcome {
        let guard = match self.start() {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!("recalibration rejected: run already active");
                return RetrainOutcome::Rejected {
                    message: err.to_string(),
                };
            }
        };

        let started = Instant::now();
        tracing::info!(?options, "recalibration started");

        match self.run_batch(&guard, &options, started).await {
            Ok(summary) => {
                tracing::info!(
                    version = %summary.version,
                    samples = summary.training_data_count,
                    accuracy = summary.metrics.accuracy,
                    rmse = summary.metrics.rmse,
                    deployed = summary.deployed,
                    duration_ms = summary.duration_ms,
                    "recalibration completed"
                );
                RetrainOutcome::Completed(summary)
            }
            Err((err, version)) => {
                tracing::error!(error = %err, version = ?version, "recalibration failed");
                RetrainOutcome::Failed {
                    message: err.to_string(),
                    version,
                }
            }
        }
    }

    async fn run_batch(
        &self,
        guard: &RunGuard<'_>,
        options: &RetrainOptions,
        started: Instant,
    ) -> Result<RetrainSummary, (RecalibrationError, Option<String>)> {
        let limit = options.limit.unwrap_or(i64::from(self.config.batch_size)).max(1);
        let samples = self
            .log
            .fetch_answer_batch(limit, options.since)
            .await
            .map_err(|e| (RecalibrationError::from(e), None))?;
        if samples.is_empty() {
            return Err((RecalibrationError::EmptyBatch, None));
        }

        let version = self
            .registry
            .create(VersionDraft {
                training_data_count: samples.len() as i64,
                training_started_at: now_ms(),
                trained_by: self.config.trained_by.clone(),
                config: TrainingConfig::default(),
            })
            .await
            .map_err(|e| (RecalibrationError::from(e), None))?;
        guard.set_version(&version);
        tracing::info!(version = %version.version, samples = samples.len(), "model version created");

        let batch = aggregate(&samples);
        let tables = calibrate(&batch);
        let parameters = summarize(&tables, samples.len());
        let metrics = evaluate(&samples, &tables);
        tracing::debug!(
            items = tables.items.len(),
            learners = tables.learners.len(),
            skipped = batch.skipped,
            "batch calibrated"
        );

        if let Err(err) = self.registry.complete(&version.id, &parameters, &metrics).await {
            if let Err(mark_err) = self.registry.fail(&version.id, err.to_string()).await {
                tracing::error!(error = %mark_err, version = %version.version, "could not mark version failed");
            }
            return Err((RecalibrationError::from(err), Some(version.version)));
        }

        let auto_deploy = options.auto_deploy.unwrap_or(self.config.auto_deploy);
        let passes_gate = metrics.accuracy > self.config.deploy_threshold;
        let mut deployed = false;
        let mut deploy_error = None;

        if auto_deploy && passes_gate {
            match self
                .registry
                .promote(&version.id, &tables.suggested_difficulties())
                .await
            {
                Ok(_) => deployed = true,
                Err(err) => {
                    tracing::error!(error = %err, version = %version.version, "auto-deploy failed; version left for manual review");
                    deploy_error = Some(err.to_string());
                }
            }
        } else {
            tracing::info!(
                version = %version.version,
                accuracy = metrics.accuracy,
                threshold = self.config.deploy_threshold,
                auto_deploy,
                "version kept for manual review"
            );
        }

        Ok(RetrainSummary {
            version: version.version,
            version_id: version.id,
            metrics,
            training_data_count: samples.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            deployed,
            deploy_error,
        })
    }

    /// Manual promotion only moves the production pointer.
    pub async fn promote(&self, version_id: &str) -> Result<ModelVersion, RecalibrationError> {
        Ok(self.registry.promote(version_id, &[]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InteractionLogConfig;
    use crate::db::DatabaseProxy;

    async fn engine() -> RecalibrationEngine {
        let db = DatabaseProxy::in_memory().await.expect("db");
        RecalibrationEngine::new(
            InteractionLog::new(db.clone(), InteractionLogConfig::default()),
            ModelRegistry::new(db),
            RecalibrationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_guard_rejects_second_start_and_releases_on_drop() {
        let engine = engine().await;
        let guard = engine.start().expect("first");
        assert!(engine.status().is_training);
        assert!(matches!(engine.start(), Err(RecalibrationError::AlreadyInProgress)));
        drop(guard);
        assert!(!engine.status().is_training);
        assert!(engine.start().is_ok());
    }

    #[tokio::test]
    async fn test_empty_batch_fails_without_creating_version() {
        let engine = engine().await;
        let outcome = engine.retrain_model(RetrainOptions::default()).await;
        match outcome {
            RetrainOutcome::Failed { message, version } => {
                assert_eq!(message, "No training data available");
                assert!(version.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(engine.registry().list(10).await.expect("list").is_empty());
        assert!(!engine.status().is_training);
    }

    #[test]
    fn test_report_shape() {
        let report = RetrainReport::from(RetrainOutcome::Rejected {
            message: "Recalibration already in progress".to_string(),
        });
        let json = serde_json::to_value(report).expect("json");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Recalibration already in progress");
        assert!(json.get("version").is_none());
    }
}
