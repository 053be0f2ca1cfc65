use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PathConfig;
use crate::db::operations::{catalog, learners, responses};
use crate::db::{now_ms, DatabaseProxy};
use crate::irt::ability::ExternalScores;
use crate::irt::path::{analyze_performance, generate_path, PathPlan, PerformanceSummary};
use crate::irt::types::{InteractionType, DEFAULT_SKILLS};
use crate::services::interaction_log::{InteractionEvent, InteractionLog};
use crate::services::model_registry::ProductionSnapshot;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("learner not found: {0}")]
    LearnerNotFound(String),
    #[error("No learning modules found. Initialize the module catalog, then try again.")]
    CatalogNotInitialized,
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOptions {
    #[serde(default)]
    pub target_skills: Option<Vec<String>>,
    #[serde(default)]
    pub external_scores: Option<ExternalScores>,
    #[serde(default)]
    pub include_onboarding: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub learner_id: String,
    pub generated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSummary>,
    #[serde(flatten)]
    pub plan: PathPlan,
}

#[derive(Clone)]
pub struct PathService {
    db: Arc<DatabaseProxy>,
    log: InteractionLog,
    snapshot: ProductionSnapshot,
    config: PathConfig,
}

impl PathService {
    pub fn new(
        db: Arc<DatabaseProxy>,
        log: InteractionLog,
        snapshot: ProductionSnapshot,
        config: PathConfig,
    ) -> Self {
        Self {
            db,
            log,
            snapshot,
            config,
        }
    }

    /// External scores, when given, replace and persist the learner's theta.
    pub async fn generate_initial_path(
        &self,
        learner_id: &str,
        options: PathOptions,
    ) -> Result<PathResult, PathError> {
        let learner = learners::get_learner(self.db.pool(), learner_id)
            .await?
            .ok_or_else(|| PathError::LearnerNotFound(learner_id.to_string()))?;

        let mut theta = learner.theta;
        if let Some(scores) = options.external_scores.as_ref() {
            theta = scores.to_theta();
            learners::update_theta(self.db.pool(), learner_id, theta, now_ms()).await?;
            tracing::info!(learner_id, theta, "theta seeded from external diagnostic");
        }

        let target_skills = options
            .target_skills
            .filter(|skills| !skills.is_empty())
            .unwrap_or_else(default_skills);

        self.build(learner_id, theta, &target_skills, options.include_onboarding.unwrap_or(true), None)
            .await
    }

    /// Rebuilds the path from the recent response window, focusing on weak
    /// skills when there are any.
    pub async fn regenerate_path(&self, learner_id: &str) -> Result<PathResult, PathError> {
        let learner = learners::get_learner(self.db.pool(), learner_id)
            .await?
            .ok_or_else(|| PathError::LearnerNotFound(learner_id.to_string()))?;

        let since = now_ms() - self.config.recent_window_days.max(0) * DAY_MS;
        let outcomes = responses::skill_outcomes_since(self.db.pool(), learner_id, since).await?;
        let performance = analyze_performance(&outcomes, self.config.weak_skill_threshold);

        let target_skills = if performance.weak_skills.is_empty() {
            default_skills()
        } else {
            performance.weak_skills.clone()
        };
        tracing::debug!(
            learner_id,
            responses = performance.total_responses,
            weak = ?performance.weak_skills,
            "regenerating path"
        );

        self.build(learner_id, learner.theta, &target_skills, false, Some(performance))
            .await
    }

    pub async fn needs_initial_path(&self, learner_id: &str) -> Result<bool, PathError> {
        if learners::get_learner(self.db.pool(), learner_id).await?.is_none() {
            return Err(PathError::LearnerNotFound(learner_id.to_string()));
        }
        Ok(!responses::has_responses(self.db.pool(), learner_id).await?)
    }

    /// Regenerates once every `regenerate_every` distinct answered items.
    pub async fn update_path_on_completion(
        &self,
        learner_id: &str,
        module_id: Option<&str>,
    ) -> Result<Option<PathResult>, PathError> {
        let learner = learners::get_learner(self.db.pool(), learner_id)
            .await?
            .ok_or_else(|| PathError::LearnerNotFound(learner_id.to_string()))?;

        if let Some(module_id) = module_id {
            self.log_module_completion(&learner.id, learner.theta, module_id).await?;
        }

        let answered = responses::distinct_items_answered(self.db.pool(), learner_id).await?;
        let every = i64::from(self.config.regenerate_every.max(1));
        if answered == 0 || answered % every != 0 {
            return Ok(None);
        }
        self.regenerate_path(learner_id).await.map(Some)
    }

    async fn log_module_completion(
        &self,
        learner_id: &str,
        theta: f64,
        module_id: &str,
    ) -> Result<(), PathError> {
        let modules = catalog::list_modules(self.db.pool()).await?;
        let Some(module) = modules.iter().find(|m| m.id == module_id) else {
            tracing::warn!(learner_id, module_id, "completed module is not in the catalog");
            return Ok(());
        };

        let mut event = InteractionEvent::module(
            learner_id,
            InteractionType::ModuleComplete,
            &module.id,
            module.level,
            &module.skill,
            None,
        );
        event.learner_level = Some(theta);
        if let Err(err) = self.log.record_detached(event) {
            tracing::warn!(error = %err, "module completion not logged");
        }
        Ok(())
    }

    async fn build(
        &self,
        learner_id: &str,
        theta: f64,
        target_skills: &[String],
        include_onboarding: bool,
        performance: Option<PerformanceSummary>,
    ) -> Result<PathResult, PathError> {
        let modules = catalog::list_modules(self.db.pool()).await?;
        let plan = generate_path(theta, &modules, target_skills, include_onboarding)
            .map_err(|_| PathError::CatalogNotInitialized)?;

        Ok(PathResult {
            learner_id: learner_id.to_string(),
            generated_at: now_ms(),
            model_version: self.snapshot.version_tag(),
            performance,
            plan,
        })
    }
}

fn default_skills() -> Vec<String> {
    DEFAULT_SKILLS.iter().map(|s| s.to_string()).collect()
}
