use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::db::DatabaseProxy;
use crate::services::ability::AbilityService;
use crate::services::interaction_log::InteractionLog;
use crate::services::learning_path::PathService;
use crate::services::model_registry::ModelRegistry;
use crate::services::recalibration::RecalibrationEngine;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    db: Arc<DatabaseProxy>,
    interactions: InteractionLog,
    ability: AbilityService,
    paths: PathService,
    engine: Arc<RecalibrationEngine>,
}

impl AppState {
    /// Wires every service over one database handle. The registry shares its
    /// production snapshot with the path service.
    pub fn new(config: Config, db: Arc<DatabaseProxy>) -> Self {
        let interactions = InteractionLog::new(Arc::clone(&db), config.interactions.clone());
        let registry = ModelRegistry::new(Arc::clone(&db));
        let paths = PathService::new(
            Arc::clone(&db),
            interactions.clone(),
            registry.snapshot().clone(),
            config.paths.clone(),
        );
        let ability = AbilityService::new(Arc::clone(&db), interactions.clone());
        let engine = Arc::new(RecalibrationEngine::new(
            interactions.clone(),
            registry,
            config.recalibration.clone(),
        ));

        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            config: Arc::new(config),
            db,
            interactions,
            ability,
            paths,
            engine,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Arc<DatabaseProxy> {
        &self.db
    }

    pub fn interactions(&self) -> &InteractionLog {
        &self.interactions
    }

    pub fn ability(&self) -> &AbilityService {
        &self.ability
    }

    pub fn paths(&self) -> &PathService {
        &self.paths
    }

    pub fn engine(&self) -> Arc<RecalibrationEngine> {
        Arc::clone(&self.engine)
    }
}
