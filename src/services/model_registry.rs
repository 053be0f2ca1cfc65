use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::db::operations::{catalog, model_versions};
use crate::db::{now_ms, DatabaseProxy};
use crate::irt::types::{
    EvaluationMetrics, ModelParameters, ModelStatus, ModelVersion, RunError, TrainingConfig,
};

pub const MODEL_TYPE: &str = "irt";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("model version not found: {0}")]
    NotFound(String),
    #[error("model version {id} is {status} and cannot be promoted")]
    NotPromotable { id: String, status: &'static str },
    #[error("model version {0} is no longer training")]
    NotTraining(String),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Process-local view of the production version, refreshed on promotion.
#[derive(Clone, Default)]
pub struct ProductionSnapshot(Arc<RwLock<Option<Arc<ModelVersion>>>>);

impl ProductionSnapshot {
    pub fn get(&self) -> Option<Arc<ModelVersion>> {
        self.0.read().clone()
    }

    pub fn version_tag(&self) -> Option<String> {
        self.0.read().as_ref().map(|v| v.version.clone())
    }

    fn replace(&self, version: Option<ModelVersion>) {
        *self.0.write() = version.map(Arc::new);
    }
}

pub struct VersionDraft {
    pub training_data_count: i64,
    pub training_started_at: i64,
    pub trained_by: String,
    pub config: TrainingConfig,
}

#[derive(Clone)]
pub struct ModelRegistry {
    db: Arc<DatabaseProxy>,
    snapshot: ProductionSnapshot,
}

impl ModelRegistry {
    pub fn new(db: Arc<DatabaseProxy>) -> Self {
        Self {
            db,
            snapshot: ProductionSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &ProductionSnapshot {
        &self.snapshot
    }

    /// Loads the persisted production version into the snapshot.
    pub async fn load_production(&self) -> Result<Option<Arc<ModelVersion>>, RegistryError> {
        let current = model_versions::get_production(self.db.pool()).await?;
        self.snapshot.replace(current);
        Ok(self.snapshot.get())
    }

    /// Registers a new version in `training` with the next version number.
    pub async fn create(&self, draft: VersionDraft) -> Result<ModelVersion, RegistryError> {
        let mut tx = self.db.pool().begin().await?;
        let version_number = model_versions::next_version_number(&mut *tx).await?;

        let version = ModelVersion {
            id: Uuid::new_v4().to_string(),
            version: format!("v{version_number}"),
            version_number,
            model_type: MODEL_TYPE.to_string(),
            training_data_count: draft.training_data_count,
            training_started_at: draft.training_started_at,
            training_completed_at: None,
            parameters: None,
            metrics: None,
            status: ModelStatus::Training,
            is_production: false,
            deployed_at: None,
            trained_by: draft.trained_by,
            config: draft.config,
            errors: Vec::new(),
            created_at: now_ms(),
        };

        model_versions::insert_version(&mut *tx, &version).await?;
        tx.commit().await?;
        Ok(version)
    }

    pub async fn complete(
        &self,
        id: &str,
        parameters: &ModelParameters,
        metrics: &EvaluationMetrics,
    ) -> Result<ModelVersion, RegistryError> {
        if !model_versions::mark_completed(self.db.pool(), id, parameters, metrics, now_ms()).await? {
            return Err(RegistryError::NotTraining(id.to_string()));
        }
        self.require(id).await
    }

    pub async fn fail(&self, id: &str, message: impl Into<String>) -> Result<(), RegistryError> {
        let error = RunError {
            timestamp: now_ms(),
            message: message.into(),
        };
        if !model_versions::mark_failed(self.db.pool(), id, &error).await? {
            return Err(RegistryError::NotTraining(id.to_string()));
        }
        Ok(())
    }

    /// Archives the current production version and deploys `id` in one
    /// transaction. `item_difficulties` are written to the catalog in the same
    /// transaction so the catalog never disagrees with the production pointer.
    pub async fn promote(
        &self,
        id: &str,
        item_difficulties: &[(String, f64)],
    ) -> Result<ModelVersion, RegistryError> {
        let now = now_ms();
        let mut tx = self.db.pool().begin().await?;

        let archived = model_versions::archive_production(&mut *tx, id).await?;
        if !model_versions::mark_deployed(&mut *tx, id, now).await? {
            tx.rollback().await?;
            return Err(match model_versions::get_version(self.db.pool(), id).await? {
                None => RegistryError::NotFound(id.to_string()),
                Some(v) => RegistryError::NotPromotable {
                    id: id.to_string(),
                    status: v.status.as_str(),
                },
            });
        }

        let mut applied = 0usize;
        for (item_id, difficulty) in item_difficulties {
            if catalog::set_item_difficulty(&mut *tx, item_id, *difficulty, now).await? {
                applied += 1;
            }
        }

        tx.commit().await?;

        let promoted = self.require(id).await?;
        self.snapshot.replace(Some(promoted.clone()));
        tracing::info!(
            version = %promoted.version,
            archived,
            items_updated = applied,
            "model version promoted to production"
        );
        Ok(promoted)
    }

    pub async fn current_production(&self) -> Result<Option<ModelVersion>, RegistryError> {
        Ok(model_versions::get_production(self.db.pool()).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ModelVersion>, RegistryError> {
        Ok(model_versions::get_version(self.db.pool(), id).await?)
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<ModelVersion>, RegistryError> {
        Ok(model_versions::list_versions(self.db.pool(), limit.clamp(1, 500)).await?)
    }

    pub async fn production_count(&self) -> Result<i64, RegistryError> {
        Ok(model_versions::count_production(self.db.pool()).await?)
    }

    async fn require(&self, id: &str) -> Result<ModelVersion, RegistryError> {
        model_versions::get_version(self.db.pool(), id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> VersionDraft {
        VersionDraft {
            training_data_count: 10,
            training_started_at: now_ms(),
            trained_by: "test".to_string(),
            config: TrainingConfig::default(),
        }
    }

    async fn completed(registry: &ModelRegistry) -> ModelVersion {
        let version = registry.create(draft()).await.expect("create");
        let params = ModelParameters {
            difficulty: crate::irt::types::DifficultySummary {
                mean: 0.0,
                variance: 0.0,
                adjustment_factor: 0.1,
            },
            discrimination: Default::default(),
            ability_estimates: Default::default(),
            learning_rate: 0.01,
            iterations: 10,
            convergence_threshold: 0.001,
        };
        registry
            .complete(&version.id, &params, &EvaluationMetrics::default())
            .await
            .expect("complete")
    }

    #[tokio::test]
    async fn test_version_numbers_increase() {
        let registry = ModelRegistry::new(DatabaseProxy::in_memory().await.expect("db"));
        let first = registry.create(draft()).await.expect("create");
        let second = registry.create(draft()).await.expect("create");
        assert_eq!(first.version, "v1");
        assert_eq!(second.version, "v2");
        assert_eq!(second.model_type, "irt");
        assert_eq!(second.status, ModelStatus::Training);
    }

    #[tokio::test]
    async fn test_promotion_archives_previous() {
        let registry = ModelRegistry::new(DatabaseProxy::in_memory().await.expect("db"));
        let a = completed(&registry).await;
        let b = completed(&registry).await;

        registry.promote(&a.id, &[]).await.expect("promote a");
        let promoted = registry.promote(&b.id, &[]).await.expect("promote b");
        assert!(promoted.is_production);
        assert_eq!(promoted.status, ModelStatus::Deployed);
        assert!(promoted.deployed_at.is_some());

        let old = registry.get(&a.id).await.expect("get").expect("exists");
        assert_eq!(old.status, ModelStatus::Archived);
        assert!(!old.is_production);
        assert_eq!(registry.production_count().await.expect("count"), 1);
        assert_eq!(registry.snapshot().version_tag(), Some(b.version));
    }

    #[tokio::test]
    async fn test_failed_version_cannot_be_promoted() {
        let registry = ModelRegistry::new(DatabaseProxy::in_memory().await.expect("db"));
        let live = completed(&registry).await;
        registry.promote(&live.id, &[]).await.expect("promote");

        let broken = registry.create(draft()).await.expect("create");
        registry.fail(&broken.id, "boom").await.expect("fail");
        let stored = registry.get(&broken.id).await.expect("get").expect("exists");
        assert_eq!(stored.status, ModelStatus::Failed);
        assert_eq!(stored.errors.len(), 1);
        assert_eq!(stored.errors[0].message, "boom");

        let err = registry.promote(&broken.id, &[]).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotPromotable { .. }));
        let production = registry.current_production().await.expect("prod").expect("exists");
        assert_eq!(production.id, live.id);

        let missing = registry.promote("nope", &[]).await.unwrap_err();
        assert!(matches!(missing, RegistryError::NotFound(_)));
    }
}
